//! Identifier Validator
//!
//! Offline ISIN checks: format, check digit and equity-savings eligibility.

pub mod isin;

pub use isin::{
    checksum, eligibility, inspect, is_valid, normalize, validate_format, Eligibility,
    ELIGIBLE_COUNTRIES, ELIGIBLE_EXCHANGES,
};
