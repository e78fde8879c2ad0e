//! Holding-period arithmetic shared by the regime resolver and the abatement ledger.

use chrono::{Datelike, NaiveDate};

use crate::error::{FiscalError, FiscalResult};

/// Whole years elapsed between `start` and `end`, counted on anniversaries.
///
/// The anniversary itself counts as a completed year, so a wrapper opened on
/// 2016-03-15 has exactly 8 years on 2024-03-15. An anniversary on 29 February
/// is reached on 1 March in common years.
pub fn whole_years_between(start: NaiveDate, end: NaiveDate) -> FiscalResult<u32> {
    if end < start {
        return Err(FiscalError::invalid_input(
            "opening_date",
            format!("{} is after the evaluation date {}", start, end),
        ));
    }

    let mut years = end.year() - start.year();
    if (end.month(), end.day()) < (start.month(), start.day()) {
        years -= 1;
    }

    Ok(years.max(0) as u32)
}
