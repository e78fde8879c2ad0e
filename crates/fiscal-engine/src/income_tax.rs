//! Income Tax Calculator
//!
//! Household income tax under the quotient familial: income is split across
//! fiscal parts, the scale is applied to one part, and the result multiplied
//! back by the number of parts.

use fiscal_core::{ensure_non_negative, FiscalProfile, FiscalResult, MaritalStatus, Money, Rate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::scale::{average_rate, BracketSlice, ProgressiveScale};

/// Income tax for one household
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeTaxResult {
    /// Taxable income divided by fiscal parts
    pub quotient_familial: Money,
    /// Scale applied to one part
    pub tax_per_part: Money,
    /// `tax_per_part * fiscal_parts`
    pub gross_tax: Money,
    /// Gross tax over taxable income
    pub average_rate: Rate,
    /// Rate of the bracket holding the quotient
    pub marginal_rate: Rate,
    /// Bracket detail for one part
    pub brackets: Vec<BracketSlice>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingMode {
    Joint,
    Separate,
}

/// Separate vs joint filing for a two-earner household
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdFilingComparison {
    pub marital_status: MaritalStatus,
    /// Sum of both single-part filings
    pub separate_tax: Money,
    /// Joint two-part filing, when the household may file jointly
    pub joint_tax: Option<Money>,
    /// Tax saved by the recommended filing over the other one
    pub saving: Money,
    pub recommended: FilingMode,
}

/// Income tax calculator bound to one annual scale
pub struct IncomeTaxCalculator<'a> {
    scale: &'a ProgressiveScale,
}

impl<'a> IncomeTaxCalculator<'a> {
    pub fn new(scale: &'a ProgressiveScale) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> &ProgressiveScale {
        self.scale
    }

    /// Compute the household's gross income tax.
    pub fn compute(&self, profile: &FiscalProfile) -> FiscalResult<IncomeTaxResult> {
        profile.validate()?;

        let quotient_familial = profile.taxable_income / profile.fiscal_parts;
        let brackets = self.scale.breakdown(quotient_familial);
        let tax_per_part: Money = brackets.iter().map(|slice| slice.tax).sum();
        let gross_tax = tax_per_part * profile.fiscal_parts;

        tracing::debug!(
            "Income tax: income={} parts={} quotient={} gross={}",
            profile.taxable_income,
            profile.fiscal_parts,
            quotient_familial,
            gross_tax
        );

        Ok(IncomeTaxResult {
            quotient_familial,
            tax_per_part,
            gross_tax,
            average_rate: average_rate(gross_tax, profile.taxable_income),
            marginal_rate: self.scale.marginal_rate(quotient_familial),
            brackets,
        })
    }

    /// Compare two single-part filings against one joint filing.
    ///
    /// Households that are neither married nor partnered must file separately.
    pub fn compare_household_filing(
        &self,
        income_a: Money,
        income_b: Money,
        marital_status: MaritalStatus,
    ) -> FiscalResult<HouseholdFilingComparison> {
        ensure_non_negative("income_a", income_a)?;
        ensure_non_negative("income_b", income_b)?;

        let separate_tax = self.scale.evaluate(income_a) + self.scale.evaluate(income_b);

        if !marital_status.files_jointly() {
            return Ok(HouseholdFilingComparison {
                marital_status,
                separate_tax,
                joint_tax: None,
                saving: Decimal::ZERO,
                recommended: FilingMode::Separate,
            });
        }

        let joint = FiscalProfile::new(income_a + income_b, Decimal::TWO, marital_status, 0)?;
        let joint_tax = self.compute(&joint)?.gross_tax;

        let (recommended, saving) = if joint_tax <= separate_tax {
            (FilingMode::Joint, separate_tax - joint_tax)
        } else {
            (FilingMode::Separate, joint_tax - separate_tax)
        };

        Ok(HouseholdFilingComparison {
            marital_status,
            separate_tax,
            joint_tax: Some(joint_tax),
            saving,
            recommended,
        })
    }
}

/// Compute income tax for `profile` under `scale`.
pub fn compute_income_tax(
    profile: &FiscalProfile,
    scale: &ProgressiveScale,
) -> FiscalResult<IncomeTaxResult> {
    IncomeTaxCalculator::new(scale).compute(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscal_core::FiscalError;
    use rust_decimal_macros::dec;

    /// France-like shape with a zero band split at 10 000 and 11 000.
    fn scenario_scale() -> ProgressiveScale {
        ProgressiveScale::from_pairs(&[
            (Some(dec!(10000)), dec!(0)),
            (Some(dec!(11000)), dec!(0)),
            (Some(dec!(25000)), dec!(0.11)),
            (Some(dec!(65000)), dec!(0.30)),
            (Some(dec!(150000)), dec!(0.41)),
            (None, dec!(0.45)),
        ])
        .unwrap()
    }

    fn profile(income: Decimal, parts: Decimal) -> FiscalProfile {
        FiscalProfile::new(income, parts, MaritalStatus::Married, 0).unwrap()
    }

    #[test]
    fn test_two_part_household_scenario() {
        let scale = scenario_scale();
        let result = compute_income_tax(&profile(dec!(60000), dec!(2)), &scale).unwrap();

        assert_eq!(result.quotient_familial, dec!(30000));
        // 14 000 at 11% then 5 000 at 30%
        assert_eq!(result.tax_per_part, dec!(3040));
        assert_eq!(result.gross_tax, result.tax_per_part * dec!(2));
        assert_eq!(result.gross_tax, dec!(6080));
        assert_eq!(result.marginal_rate, dec!(0.30));

        let direct = scale.evaluate(dec!(60000));
        assert_eq!(direct, dec!(12040));
        assert_ne!(result.gross_tax - direct, dec!(0));
    }

    #[test]
    fn test_single_part_matches_direct_evaluation() {
        let scale = scenario_scale();
        for income in [dec!(0), dec!(9999), dec!(11000), dec!(42000), dec!(65000), dec!(310000)] {
            let result = compute_income_tax(&profile(income, dec!(1)), &scale).unwrap();
            assert_eq!(result.gross_tax, scale.evaluate(income));
        }
    }

    #[test]
    fn test_average_rate() {
        let scale = scenario_scale();
        let result = compute_income_tax(&profile(dec!(60000), dec!(2)), &scale).unwrap();
        assert_eq!(result.average_rate, dec!(6080) / dec!(60000));

        let zero = compute_income_tax(&profile(dec!(0), dec!(1)), &scale).unwrap();
        assert_eq!(zero.average_rate, dec!(0));
        assert_eq!(zero.gross_tax, dec!(0));
    }

    #[test]
    fn test_rejects_invalid_profile() {
        let scale = scenario_scale();
        let bad = FiscalProfile {
            taxable_income: dec!(-100),
            fiscal_parts: dec!(1),
            marital_status: MaritalStatus::Single,
            dependents_count: 0,
        };
        let err = compute_income_tax(&bad, &scale).unwrap_err();
        assert!(matches!(err, FiscalError::InvalidInput { .. }));
    }

    #[test]
    fn test_household_filing_comparison() {
        let scale = scenario_scale();
        let calculator = IncomeTaxCalculator::new(&scale);

        let married = calculator
            .compare_household_filing(dec!(60000), dec!(0), MaritalStatus::Married)
            .unwrap();
        assert_eq!(married.separate_tax, dec!(12040));
        assert_eq!(married.joint_tax, Some(dec!(6080)));
        assert_eq!(married.recommended, FilingMode::Joint);
        assert_eq!(married.saving, dec!(5960));

        let unmarried = calculator
            .compare_household_filing(dec!(60000), dec!(0), MaritalStatus::Single)
            .unwrap();
        assert_eq!(unmarried.joint_tax, None);
        assert_eq!(unmarried.recommended, FilingMode::Separate);
    }
}
