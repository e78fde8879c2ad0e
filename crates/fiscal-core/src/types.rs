use chrono::NaiveDate;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{FiscalError, FiscalResult};

/// Monetary amount in euros. Never rounded inside the engine.
pub type Money = Decimal;

/// Rate expressed as a fraction (`0.30` is 30%).
pub type Rate = Decimal;

/// Reject negative amounts. Decimal values are always finite, so this is the
/// only check left once a value has been parsed.
pub fn ensure_non_negative(field: &str, value: Decimal) -> FiscalResult<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(FiscalError::invalid_input(
            field,
            format!("must not be negative (got {})", value),
        ));
    }
    Ok(())
}

/// Reject rates outside `[0, 1]`.
pub fn ensure_rate(field: &str, value: Rate) -> FiscalResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(FiscalError::invalid_input(
            field,
            format!("must be within [0, 1] (got {})", value),
        ));
    }
    Ok(())
}

/// Convert a float coming from a loose boundary record into a non-negative amount.
pub fn money_from_f64(field: &str, value: f64) -> FiscalResult<Money> {
    if !value.is_finite() {
        return Err(FiscalError::invalid_input(field, "must be a finite number"));
    }
    let money = Decimal::from_f64(value)
        .ok_or_else(|| FiscalError::invalid_input(field, format!("{} is out of range", value)))?;
    ensure_non_negative(field, money)?;
    Ok(money)
}

/// Household marital status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaritalStatus {
    Single,
    Married,
    CivilPartnership,
    Divorced,
    Widowed,
}

impl MaritalStatus {
    /// Married and partnered households file jointly.
    pub fn files_jointly(&self) -> bool {
        matches!(self, MaritalStatus::Married | MaritalStatus::CivilPartnership)
    }
}

impl Default for MaritalStatus {
    fn default() -> Self {
        Self::Single
    }
}

impl std::fmt::Display for MaritalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaritalStatus::Single => write!(f, "single"),
            MaritalStatus::Married => write!(f, "married"),
            MaritalStatus::CivilPartnership => write!(f, "civil_partnership"),
            MaritalStatus::Divorced => write!(f, "divorced"),
            MaritalStatus::Widowed => write!(f, "widowed"),
        }
    }
}

impl FromStr for MaritalStatus {
    type Err = FiscalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(MaritalStatus::Single),
            "married" => Ok(MaritalStatus::Married),
            "civil_partnership" | "pacs" => Ok(MaritalStatus::CivilPartnership),
            "divorced" => Ok(MaritalStatus::Divorced),
            "widowed" => Ok(MaritalStatus::Widowed),
            other => Err(FiscalError::Configuration(format!(
                "unknown marital status '{}'",
                other
            ))),
        }
    }
}

/// Household income situation for one income-tax computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalProfile {
    /// Net taxable income of the household
    pub taxable_income: Money,
    /// Number of fiscal parts (at least 1)
    pub fiscal_parts: Decimal,
    #[serde(default)]
    pub marital_status: MaritalStatus,
    #[serde(default)]
    pub dependents_count: u32,
}

impl FiscalProfile {
    pub fn new(
        taxable_income: Money,
        fiscal_parts: Decimal,
        marital_status: MaritalStatus,
        dependents_count: u32,
    ) -> FiscalResult<Self> {
        let profile = Self {
            taxable_income,
            fiscal_parts,
            marital_status,
            dependents_count,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Build a profile whose parts follow the standard household rules.
    pub fn with_standard_parts(
        taxable_income: Money,
        marital_status: MaritalStatus,
        dependents_count: u32,
    ) -> FiscalResult<Self> {
        Self::new(
            taxable_income,
            standard_fiscal_parts(marital_status, dependents_count),
            marital_status,
            dependents_count,
        )
    }

    pub fn validate(&self) -> FiscalResult<()> {
        ensure_non_negative("taxable_income", self.taxable_income)?;
        if self.fiscal_parts < Decimal::ONE {
            return Err(FiscalError::invalid_input(
                "fiscal_parts",
                format!("must be at least 1 (got {})", self.fiscal_parts),
            ));
        }
        Ok(())
    }
}

/// Parts granted by the household composition: 1 per adult filer, half a part
/// for each of the first two dependents, a full part from the third on, and an
/// extra half part for a parent raising dependents alone.
pub fn standard_fiscal_parts(marital_status: MaritalStatus, dependents_count: u32) -> Decimal {
    let half = Decimal::new(5, 1);
    let adults = if marital_status.files_jointly() {
        Decimal::TWO
    } else {
        Decimal::ONE
    };

    let first_two = Decimal::from(dependents_count.min(2)) * half;
    let further = Decimal::from(dependents_count.saturating_sub(2));
    let single_parent = if !marital_status.files_jointly() && dependents_count > 0 {
        half
    } else {
        Decimal::ZERO
    };

    adults + first_two + further + single_parent
}

/// Net real-estate worth subject to the wealth tax
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WealthAssessmentInput {
    pub net_real_estate_worth: Money,
}

/// Relationship between the deceased (or donor) and the heir
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeirClass {
    /// Surviving spouse or civil partner, fully exempt
    Spouse,
    /// Children and parents
    DirectLine,
    /// Brothers and sisters
    Sibling,
    /// Nephews and nieces
    NephewNiece,
    /// Any other heir
    Other,
}

impl HeirClass {
    pub const ALL: [HeirClass; 5] = [
        HeirClass::Spouse,
        HeirClass::DirectLine,
        HeirClass::Sibling,
        HeirClass::NephewNiece,
        HeirClass::Other,
    ];
}

impl std::fmt::Display for HeirClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeirClass::Spouse => write!(f, "spouse"),
            HeirClass::DirectLine => write!(f, "direct_line"),
            HeirClass::Sibling => write!(f, "sibling"),
            HeirClass::NephewNiece => write!(f, "nephew_niece"),
            HeirClass::Other => write!(f, "other"),
        }
    }
}

impl FromStr for HeirClass {
    type Err = FiscalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spouse" => Ok(HeirClass::Spouse),
            "direct_line" => Ok(HeirClass::DirectLine),
            "sibling" => Ok(HeirClass::Sibling),
            "nephew_niece" => Ok(HeirClass::NephewNiece),
            "other" => Ok(HeirClass::Other),
            other => Err(FiscalError::Configuration(format!(
                "unknown heir class '{}'",
                other
            ))),
        }
    }
}

/// One transfer to one heir
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessionTransfer {
    pub amount: Money,
    pub heir_class: HeirClass,
    /// Abatement still available for this heir, as tracked by the caller
    pub abatement_remaining: Money,
}

/// Investment wrapper families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapperType {
    /// Equity savings plan (PEA): regime switches at maturity
    EquitySavings,
    /// Ordinary brokerage account (CTO)
    Brokerage,
    /// Life-insurance contract: three age bands
    LifeInsurance,
    /// Retirement plan (PER): deduction on entry, taxed on exit
    Retirement,
}

impl WrapperType {
    pub const ALL: [WrapperType; 4] = [
        WrapperType::EquitySavings,
        WrapperType::Brokerage,
        WrapperType::LifeInsurance,
        WrapperType::Retirement,
    ];
}

impl std::fmt::Display for WrapperType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WrapperType::EquitySavings => write!(f, "equity_savings"),
            WrapperType::Brokerage => write!(f, "brokerage"),
            WrapperType::LifeInsurance => write!(f, "life_insurance"),
            WrapperType::Retirement => write!(f, "retirement"),
        }
    }
}

impl FromStr for WrapperType {
    type Err = FiscalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "equity_savings" | "pea" | "a" => Ok(WrapperType::EquitySavings),
            "brokerage" | "cto" | "b" => Ok(WrapperType::Brokerage),
            "life_insurance" | "av" | "c" => Ok(WrapperType::LifeInsurance),
            "retirement" | "per" | "d" => Ok(WrapperType::Retirement),
            other => Err(FiscalError::Configuration(format!(
                "unknown wrapper type '{}'",
                other
            ))),
        }
    }
}

/// Point-in-time view of one wrapper held by the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentWrapperSnapshot {
    pub wrapper_type: WrapperType,
    /// Current market value
    pub valuation: Money,
    /// Date the wrapper was opened; drives the holding period
    pub opening_date: NaiveDate,
    /// Expected annual income or gain as a fraction of valuation
    pub annual_yield_estimate: Rate,
    /// Share invested in the interest-bearing fund (life insurance only)
    #[serde(default)]
    pub secondary_allocation_ratio: Option<Rate>,
}

impl InvestmentWrapperSnapshot {
    pub fn validate(&self) -> FiscalResult<()> {
        ensure_non_negative("valuation", self.valuation)?;
        ensure_rate("annual_yield_estimate", self.annual_yield_estimate)?;
        if let Some(ratio) = self.secondary_allocation_ratio {
            ensure_rate("secondary_allocation_ratio", ratio)?;
        }
        Ok(())
    }

    /// Estimated income or gain over one year
    pub fn annual_gain(&self) -> Money {
        self.valuation * self.annual_yield_estimate
    }
}

/// Where an identifier record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupSource {
    Cache,
    Lookup,
    Fallback,
}

impl std::fmt::Display for LookupSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupSource::Cache => write!(f, "cache"),
            LookupSource::Lookup => write!(f, "lookup"),
            LookupSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// Validation and enrichment outcome for one security identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    /// Normalized 12-character code
    pub code: String,
    /// Two-letter country prefix (empty when the code is too short)
    pub country: String,
    pub is_format_valid: bool,
    pub is_checksum_valid: bool,
    /// Confirmed by the lookup service (or checksum-valid when looked up offline)
    pub is_valid: bool,
    /// Tax-advantaged wrapper eligibility; `None` when classification is unknown
    pub eligibility_flag: Option<bool>,
    /// Confidence in `is_valid`, within [0, 1]
    pub confidence: f64,
    pub source: LookupSource,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub exchange_code: Option<String>,
    #[serde(default)]
    pub market_sector: Option<String>,
    #[serde(default)]
    pub security_type: Option<String>,
    #[serde(default)]
    pub warning: Option<String>,
}

impl IdentifierRecord {
    /// A lookup produced data worth caching.
    pub fn is_positive(&self) -> bool {
        self.is_valid || self.name.is_some()
    }
}
