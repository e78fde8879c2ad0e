//! Fiscal Engine
//!
//! Deterministic tax calculators built on a shared progressive-scale
//! evaluator: household income tax, real-estate wealth tax, succession duties,
//! investment wrapper regimes and total cost of ownership.

pub mod income_tax;
pub mod parameters;
pub mod scale;
pub mod succession;
pub mod tco;
pub mod wealth_tax;
pub mod wrapper;

pub use income_tax::{
    compute_income_tax, FilingMode, HouseholdFilingComparison, IncomeTaxCalculator,
    IncomeTaxResult,
};
pub use parameters::{FiscalParameters, PARAMETERS_PATH_ENV};
pub use scale::{
    average_rate, bracket_breakdown, evaluate, marginal_rate, BracketSlice, ProgressiveScale,
    TaxBracket,
};
pub use succession::{HeirSchedule, SuccessionDutyCalculator, SuccessionParameters, SuccessionResult};
pub use tco::{aggregate, compute_tco, ManagementFeeDefaults, TcoBreakdown, TcoEngine};
pub use wealth_tax::{compute_wealth_tax, WealthTaxCalculator, WealthTaxParameters, WealthTaxResult};
pub use wrapper::{
    AnnuityBand, ContributionCapacity, EquitySavingsRules, IncomeTaxTreatment, LevyRates,
    LifeInsuranceRules, Regime, ResolvedRegime, RetirementDeduction, RetirementExit,
    RetirementRules, TaxpayerContext, WrapperRegimeResolver, WrapperRules,
};
