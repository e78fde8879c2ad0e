//! Wrapper Regime Resolver
//!
//! Maps an investment wrapper and its holding period to the tax regime that
//! applies to its gains. Each wrapper type is a small state machine whose
//! transitions are whole-year holding thresholds or caller-selected options.

use chrono::{NaiveDate, Utc};
use fiscal_core::{
    ensure_non_negative, whole_years_between, FiscalError, FiscalProfile, FiscalResult,
    InvestmentWrapperSnapshot, Money, Rate, WrapperType,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::scale::{average_rate, ProgressiveScale};

/// Social levies and the income part of the flat withholding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevyRates {
    /// Social levies on investment income (17.2%)
    pub social_levy_rate: Rate,
    /// Income-tax part of the flat withholding (12.8%)
    pub flat_income_rate: Rate,
}

impl LevyRates {
    /// Full flat withholding: income part plus social levies
    pub fn flat_tax_rate(&self) -> Rate {
        self.flat_income_rate + self.social_levy_rate
    }
}

impl Default for LevyRates {
    fn default() -> Self {
        Self {
            social_levy_rate: dec!(0.172),
            flat_income_rate: dec!(0.128),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySavingsRules {
    /// Years after which gains leave income tax
    pub maturity_years: u32,
    /// Lifetime contribution ceiling
    pub contribution_ceiling: Money,
}

impl Default for EquitySavingsRules {
    fn default() -> Self {
        Self {
            maturity_years: 5,
            contribution_ceiling: dec!(150000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeInsuranceRules {
    /// Start of the middle band, in whole years
    pub medium_band_years: u32,
    /// Start of the long band, in whole years
    pub long_band_years: u32,
    pub short_rate: Rate,
    pub medium_rate: Rate,
    pub long_rate: Rate,
    /// Annual allowance on gains in the long band, per single filer
    pub allowance_single: Money,
    /// Annual allowance on gains in the long band, per couple
    pub allowance_couple: Money,
}

impl Default for LifeInsuranceRules {
    fn default() -> Self {
        Self {
            medium_band_years: 4,
            long_band_years: 8,
            short_rate: dec!(0.35),
            medium_rate: dec!(0.15),
            long_rate: dec!(0.075),
            allowance_single: dec!(4600),
            allowance_couple: dec!(9200),
        }
    }
}

/// Taxable share of an annuity, by the holder's age at the first payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnuityBand {
    pub from_age: u32,
    pub taxable_fraction: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetirementRules {
    /// Share of professional income deductible on entry
    pub deduction_rate: Rate,
    /// Deduction ceiling never falls below this amount
    pub deduction_floor: Money,
    /// Cap on the income-based part of the ceiling
    pub deduction_cap: Money,
    /// Bands sorted by ascending `from_age`, the first starting at 0
    pub annuity_bands: Vec<AnnuityBand>,
}

impl RetirementRules {
    /// Taxable fraction for an annuity starting at `age`. An age equal to a
    /// band's lower edge belongs to that (older) band.
    pub fn annuity_fraction(&self, age: u32) -> Rate {
        self.annuity_bands
            .iter()
            .rev()
            .find(|band| age >= band.from_age)
            .map(|band| band.taxable_fraction)
            .unwrap_or(Decimal::ONE)
    }
}

impl Default for RetirementRules {
    fn default() -> Self {
        Self {
            deduction_rate: dec!(0.10),
            deduction_floor: dec!(4637),
            deduction_cap: dec!(35194),
            annuity_bands: vec![
                AnnuityBand { from_age: 0, taxable_fraction: dec!(0.70) },
                AnnuityBand { from_age: 50, taxable_fraction: dec!(0.50) },
                AnnuityBand { from_age: 60, taxable_fraction: dec!(0.40) },
                AnnuityBand { from_age: 70, taxable_fraction: dec!(0.30) },
            ],
        }
    }
}

/// Rate tables for every wrapper type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WrapperRules {
    pub levies: LevyRates,
    pub equity_savings: EquitySavingsRules,
    pub life_insurance: LifeInsuranceRules,
    pub retirement: RetirementRules,
}

impl WrapperRules {
    pub fn validate(&self) -> FiscalResult<()> {
        let rates = [
            ("social_levy_rate", self.levies.social_levy_rate),
            ("flat_income_rate", self.levies.flat_income_rate),
            ("short_rate", self.life_insurance.short_rate),
            ("medium_rate", self.life_insurance.medium_rate),
            ("long_rate", self.life_insurance.long_rate),
            ("deduction_rate", self.retirement.deduction_rate),
        ];
        for (name, rate) in rates {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(FiscalError::Configuration(format!(
                    "{} must be within [0, 1] (got {})",
                    name, rate
                )));
            }
        }

        if self.life_insurance.medium_band_years >= self.life_insurance.long_band_years {
            return Err(FiscalError::Configuration(
                "life insurance medium band must start before the long band".to_string(),
            ));
        }

        let bands = &self.retirement.annuity_bands;
        if bands.first().map(|b| b.from_age) != Some(0) {
            return Err(FiscalError::Configuration(
                "annuity bands must start at age 0".to_string(),
            ));
        }
        if bands.windows(2).any(|w| w[1].from_age <= w[0].from_age) {
            return Err(FiscalError::Configuration(
                "annuity bands must have increasing ages".to_string(),
            ));
        }
        Ok(())
    }
}

/// How a retirement plan pays out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "form")]
pub enum RetirementExit {
    LumpSum,
    Annuity { age_at_first_payment: u32 },
}

impl Default for RetirementExit {
    fn default() -> Self {
        Self::LumpSum
    }
}

/// Taxpayer options that select a regime where time alone does not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxpayerContext {
    /// Marginal income-tax rate of the household
    pub marginal_rate: Rate,
    /// Opt for the progressive scale instead of the flat withholding
    #[serde(default)]
    pub progressive_option: bool,
    /// Couple allowance for long-held life insurance
    #[serde(default)]
    pub couple: bool,
    #[serde(default)]
    pub retirement_exit: RetirementExit,
}

impl TaxpayerContext {
    pub fn new(marginal_rate: Rate) -> Self {
        Self {
            marginal_rate,
            progressive_option: false,
            couple: false,
            retirement_exit: RetirementExit::LumpSum,
        }
    }

    /// Derive the marginal rate from the household's quotient on `scale`.
    pub fn from_profile(profile: &FiscalProfile, scale: &ProgressiveScale) -> FiscalResult<Self> {
        profile.validate()?;
        let quotient = profile.taxable_income / profile.fiscal_parts;
        Ok(Self {
            couple: profile.marital_status.files_jointly(),
            ..Self::new(scale.marginal_rate(quotient))
        })
    }

    pub fn with_progressive_option(mut self, progressive_option: bool) -> Self {
        self.progressive_option = progressive_option;
        self
    }

    pub fn with_couple(mut self, couple: bool) -> Self {
        self.couple = couple;
        self
    }

    pub fn with_retirement_exit(mut self, retirement_exit: RetirementExit) -> Self {
        self.retirement_exit = retirement_exit;
        self
    }

    fn validate(&self) -> FiscalResult<()> {
        if self.marginal_rate < Decimal::ZERO || self.marginal_rate > Decimal::ONE {
            return Err(FiscalError::invalid_input(
                "marginal_rate",
                format!("must be within [0, 1] (got {})", self.marginal_rate),
            ));
        }
        Ok(())
    }
}

/// Regime states across all wrapper types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    EquitySavingsBeforeMaturity,
    EquitySavingsAfterMaturity,
    BrokerageFlatTax,
    BrokerageProgressive,
    LifeInsuranceShort,
    LifeInsuranceMedium,
    LifeInsuranceLong,
    RetirementLumpSum,
    RetirementAnnuity,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::EquitySavingsBeforeMaturity => write!(f, "Equity savings before maturity"),
            Regime::EquitySavingsAfterMaturity => write!(f, "Equity savings after maturity"),
            Regime::BrokerageFlatTax => write!(f, "Brokerage flat withholding"),
            Regime::BrokerageProgressive => write!(f, "Brokerage progressive scale"),
            Regime::LifeInsuranceShort => write!(f, "Life insurance under medium band"),
            Regime::LifeInsuranceMedium => write!(f, "Life insurance medium band"),
            Regime::LifeInsuranceLong => write!(f, "Life insurance long band"),
            Regime::RetirementLumpSum => write!(f, "Retirement lump sum"),
            Regime::RetirementAnnuity => write!(f, "Retirement annuity"),
        }
    }
}

/// Income-tax side of a regime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "rate")]
pub enum IncomeTaxTreatment {
    Exempt,
    Flat(Rate),
    Progressive(Rate),
}

impl IncomeTaxTreatment {
    pub fn rate(&self) -> Rate {
        match self {
            IncomeTaxTreatment::Exempt => Decimal::ZERO,
            IncomeTaxTreatment::Flat(rate) | IncomeTaxTreatment::Progressive(rate) => *rate,
        }
    }
}

/// Regime applicable to a wrapper at one evaluation date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRegime {
    pub wrapper_type: WrapperType,
    pub regime: Regime,
    pub holding_period_years: u32,
    pub income_tax: IncomeTaxTreatment,
    pub social_levy_rate: Rate,
    /// Amount of gain exempt from income tax each year
    pub annual_allowance: Option<Money>,
    /// Share of the payout subject to tax (below 1 for annuities only)
    pub taxable_fraction: Rate,
    /// Share of the gain levied every year on the interest-bearing fund
    pub interest_levy_ratio: Option<Rate>,
}

impl ResolvedRegime {
    pub fn income_tax_on(&self, gain: Money) -> Money {
        if gain <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let taxable = gain * self.taxable_fraction;
        let after_allowance = match self.annual_allowance {
            Some(allowance) => (taxable - allowance).max(Decimal::ZERO),
            None => taxable,
        };
        after_allowance * self.income_tax.rate()
    }

    pub fn social_levy_on(&self, gain: Money) -> Money {
        if gain <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        gain * self.taxable_fraction * self.social_levy_rate
    }

    /// Total tax on a realized gain or income.
    pub fn tax_on(&self, gain: Money) -> Money {
        self.income_tax_on(gain).saturating_add(self.social_levy_on(gain))
    }

    pub fn effective_rate_on(&self, gain: Money) -> Rate {
        average_rate(self.tax_on(gain), gain)
    }

    /// Combined rate ignoring any allowance
    pub fn headline_rate(&self) -> Rate {
        self.taxable_fraction * (self.income_tax.rate() + self.social_levy_rate)
    }

    /// Part of the social levy on `gain` withheld every year on the
    /// interest-bearing fund, whatever the contract's age.
    pub fn annual_interest_levy(&self, gain: Money) -> Money {
        match self.interest_levy_ratio {
            Some(ratio) if gain > Decimal::ZERO => gain * ratio * self.social_levy_rate,
            _ => Decimal::ZERO,
        }
    }
}

/// Deduction granted on a retirement-plan contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetirementDeduction {
    /// Ceiling earned on the current year's income
    pub ceiling: Money,
    /// Unused ceilings carried forward from prior years
    pub unused_prior_ceilings: Money,
    pub total_available: Money,
    pub deductible_amount: Money,
    pub tax_saving: Money,
    /// Contribution minus the tax saving
    pub net_cost: Money,
}

/// Room left under the equity-savings contribution ceiling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionCapacity {
    pub ceiling: Money,
    pub remaining: Money,
    /// Part of the new contribution that fits under the ceiling
    pub accepted: Money,
    pub within_ceiling: bool,
}

pub struct WrapperRegimeResolver<'a> {
    rules: &'a WrapperRules,
}

impl<'a> WrapperRegimeResolver<'a> {
    pub fn new(rules: &'a WrapperRules) -> Self {
        Self { rules }
    }

    /// Resolve the regime of `snapshot` on `as_of`.
    pub fn resolve(
        &self,
        snapshot: &InvestmentWrapperSnapshot,
        as_of: NaiveDate,
        context: &TaxpayerContext,
    ) -> FiscalResult<ResolvedRegime> {
        snapshot.validate()?;
        context.validate()?;
        let years = whole_years_between(snapshot.opening_date, as_of)?;

        let levies = &self.rules.levies;
        let elective = if context.progressive_option {
            IncomeTaxTreatment::Progressive(context.marginal_rate)
        } else {
            IncomeTaxTreatment::Flat(levies.flat_income_rate)
        };

        let mut resolved = ResolvedRegime {
            wrapper_type: snapshot.wrapper_type,
            regime: Regime::BrokerageFlatTax,
            holding_period_years: years,
            income_tax: elective,
            social_levy_rate: levies.social_levy_rate,
            annual_allowance: None,
            taxable_fraction: Decimal::ONE,
            interest_levy_ratio: None,
        };

        match snapshot.wrapper_type {
            WrapperType::EquitySavings => {
                if years >= self.rules.equity_savings.maturity_years {
                    resolved.regime = Regime::EquitySavingsAfterMaturity;
                    resolved.income_tax = IncomeTaxTreatment::Exempt;
                } else {
                    resolved.regime = Regime::EquitySavingsBeforeMaturity;
                }
            }
            WrapperType::Brokerage => {
                resolved.regime = if context.progressive_option {
                    Regime::BrokerageProgressive
                } else {
                    Regime::BrokerageFlatTax
                };
            }
            WrapperType::LifeInsurance => {
                let rules = &self.rules.life_insurance;
                let (regime, rate) = if years >= rules.long_band_years {
                    (Regime::LifeInsuranceLong, rules.long_rate)
                } else if years >= rules.medium_band_years {
                    (Regime::LifeInsuranceMedium, rules.medium_rate)
                } else {
                    (Regime::LifeInsuranceShort, rules.short_rate)
                };
                resolved.regime = regime;
                resolved.income_tax = match regime {
                    Regime::LifeInsuranceLong => IncomeTaxTreatment::Flat(rate),
                    _ if context.progressive_option => {
                        IncomeTaxTreatment::Progressive(rate.min(context.marginal_rate))
                    }
                    _ => IncomeTaxTreatment::Flat(rate),
                };
                if regime == Regime::LifeInsuranceLong {
                    resolved.annual_allowance = Some(if context.couple {
                        rules.allowance_couple
                    } else {
                        rules.allowance_single
                    });
                }
                resolved.interest_levy_ratio = snapshot.secondary_allocation_ratio;
            }
            WrapperType::Retirement => {
                resolved.income_tax = IncomeTaxTreatment::Progressive(context.marginal_rate);
                match context.retirement_exit {
                    RetirementExit::LumpSum => resolved.regime = Regime::RetirementLumpSum,
                    RetirementExit::Annuity { age_at_first_payment } => {
                        resolved.regime = Regime::RetirementAnnuity;
                        resolved.taxable_fraction =
                            self.rules.retirement.annuity_fraction(age_at_first_payment);
                    }
                }
            }
        }

        tracing::debug!(
            "Resolved {} held {}y: {} (headline {})",
            snapshot.wrapper_type,
            years,
            resolved.regime,
            resolved.headline_rate()
        );

        Ok(resolved)
    }

    /// Resolve against today's date.
    pub fn resolve_today(
        &self,
        snapshot: &InvestmentWrapperSnapshot,
        context: &TaxpayerContext,
    ) -> FiscalResult<ResolvedRegime> {
        self.resolve(snapshot, Utc::now().date_naive(), context)
    }

    /// Deduction on a retirement-plan contribution. The year's ceiling is the
    /// greater of the floor and the capped share of professional income;
    /// ceilings left unused in prior years add to it.
    pub fn retirement_deduction(
        &self,
        contribution: Money,
        professional_income: Money,
        unused_prior_ceilings: Money,
        marginal_rate: Rate,
    ) -> FiscalResult<RetirementDeduction> {
        ensure_non_negative("contribution", contribution)?;
        ensure_non_negative("professional_income", professional_income)?;
        ensure_non_negative("unused_prior_ceilings", unused_prior_ceilings)?;
        TaxpayerContext::new(marginal_rate).validate()?;

        let rules = &self.rules.retirement;
        let income_based = (professional_income * rules.deduction_rate).min(rules.deduction_cap);
        let ceiling = income_based.max(rules.deduction_floor);
        let total_available = ceiling.checked_add(unused_prior_ceilings).ok_or_else(|| {
            FiscalError::invalid_input("unused_prior_ceilings", "too large to add to the ceiling")
        })?;
        let deductible_amount = contribution.min(total_available);
        let tax_saving = deductible_amount * marginal_rate;

        Ok(RetirementDeduction {
            ceiling,
            unused_prior_ceilings,
            total_available,
            deductible_amount,
            tax_saving,
            net_cost: contribution - tax_saving,
        })
    }

    /// Check a new equity-savings contribution against the lifetime ceiling.
    pub fn equity_savings_capacity(
        &self,
        contributed: Money,
        new_contribution: Money,
    ) -> FiscalResult<ContributionCapacity> {
        ensure_non_negative("contributed", contributed)?;
        ensure_non_negative("new_contribution", new_contribution)?;

        let ceiling = self.rules.equity_savings.contribution_ceiling;
        let remaining = (ceiling - contributed).max(Decimal::ZERO);

        Ok(ContributionCapacity {
            ceiling,
            remaining,
            accepted: new_contribution.min(remaining),
            within_ceiling: contributed <= ceiling && new_contribution <= remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscal_core::MaritalStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn snapshot(wrapper_type: WrapperType, opened: NaiveDate) -> InvestmentWrapperSnapshot {
        InvestmentWrapperSnapshot {
            wrapper_type,
            valuation: dec!(100000),
            opening_date: opened,
            annual_yield_estimate: dec!(0.05),
            secondary_allocation_ratio: None,
        }
    }

    fn as_of() -> NaiveDate {
        date(2024, 6, 15)
    }

    #[test]
    fn test_equity_savings_maturity_boundary() {
        let rules = WrapperRules::default();
        let resolver = WrapperRegimeResolver::new(&rules);
        let context = TaxpayerContext::new(dec!(0.30));

        let exactly_five = resolver
            .resolve(&snapshot(WrapperType::EquitySavings, date(2019, 6, 15)), as_of(), &context)
            .unwrap();
        assert_eq!(exactly_five.regime, Regime::EquitySavingsAfterMaturity);
        assert_eq!(exactly_five.income_tax, IncomeTaxTreatment::Exempt);
        assert_eq!(exactly_five.headline_rate(), dec!(0.172));

        let day_short = resolver
            .resolve(&snapshot(WrapperType::EquitySavings, date(2019, 6, 16)), as_of(), &context)
            .unwrap();
        assert_eq!(day_short.regime, Regime::EquitySavingsBeforeMaturity);
        assert_eq!(day_short.holding_period_years, 4);
        assert_eq!(day_short.headline_rate(), dec!(0.30));
    }

    #[test]
    fn test_equity_savings_progressive_option_before_maturity() {
        let rules = WrapperRules::default();
        let resolver = WrapperRegimeResolver::new(&rules);
        let context = TaxpayerContext::new(dec!(0.30)).with_progressive_option(true);

        let resolved = resolver
            .resolve(&snapshot(WrapperType::EquitySavings, date(2022, 1, 1)), as_of(), &context)
            .unwrap();
        assert_eq!(resolved.income_tax, IncomeTaxTreatment::Progressive(dec!(0.30)));
        assert_eq!(resolved.headline_rate(), dec!(0.472));
    }

    #[test]
    fn test_brokerage_flat_and_progressive() {
        let rules = WrapperRules::default();
        let resolver = WrapperRegimeResolver::new(&rules);
        let wrapper = snapshot(WrapperType::Brokerage, date(2000, 1, 1));

        let flat = resolver.resolve(&wrapper, as_of(), &TaxpayerContext::new(dec!(0.11))).unwrap();
        assert_eq!(flat.regime, Regime::BrokerageFlatTax);
        assert_eq!(flat.headline_rate(), dec!(0.30));
        assert_eq!(flat.tax_on(dec!(2000)), dec!(600));

        let progressive = resolver
            .resolve(
                &wrapper,
                as_of(),
                &TaxpayerContext::new(dec!(0.11)).with_progressive_option(true),
            )
            .unwrap();
        assert_eq!(progressive.regime, Regime::BrokerageProgressive);
        assert_eq!(progressive.tax_on(dec!(2000)), dec!(564));
    }

    #[test]
    fn test_life_insurance_bands_and_boundaries() {
        let rules = WrapperRules::default();
        let resolver = WrapperRegimeResolver::new(&rules);
        let context = TaxpayerContext::new(dec!(0.30));

        let cases = [
            (date(2022, 6, 15), Regime::LifeInsuranceShort, dec!(0.35)),
            (date(2020, 6, 16), Regime::LifeInsuranceShort, dec!(0.35)),
            (date(2020, 6, 15), Regime::LifeInsuranceMedium, dec!(0.15)),
            (date(2016, 6, 16), Regime::LifeInsuranceMedium, dec!(0.15)),
            (date(2016, 6, 15), Regime::LifeInsuranceLong, dec!(0.075)),
        ];
        for (opened, regime, rate) in cases {
            let resolved = resolver
                .resolve(&snapshot(WrapperType::LifeInsurance, opened), as_of(), &context)
                .unwrap();
            assert_eq!(resolved.regime, regime, "opened {}", opened);
            assert_eq!(resolved.income_tax.rate(), rate);
            assert_eq!(resolved.social_levy_rate, dec!(0.172));
        }
    }

    #[test]
    fn test_life_insurance_progressive_option_caps_band_rate() {
        let rules = WrapperRules::default();
        let resolver = WrapperRegimeResolver::new(&rules);
        let low_bracket = TaxpayerContext::new(dec!(0.11)).with_progressive_option(true);
        let high_bracket = TaxpayerContext::new(dec!(0.41)).with_progressive_option(true);

        let short = snapshot(WrapperType::LifeInsurance, date(2022, 6, 15));
        let resolved = resolver.resolve(&short, as_of(), &low_bracket).unwrap();
        assert_eq!(resolved.regime, Regime::LifeInsuranceShort);
        assert_eq!(resolved.income_tax, IncomeTaxTreatment::Progressive(dec!(0.11)));
        let resolved = resolver.resolve(&short, as_of(), &high_bracket).unwrap();
        assert_eq!(resolved.income_tax, IncomeTaxTreatment::Progressive(dec!(0.35)));

        let medium = snapshot(WrapperType::LifeInsurance, date(2018, 6, 15));
        let resolved = resolver.resolve(&medium, as_of(), &low_bracket).unwrap();
        assert_eq!(resolved.regime, Regime::LifeInsuranceMedium);
        assert_eq!(resolved.income_tax, IncomeTaxTreatment::Progressive(dec!(0.11)));
        // 1 000 at 11% + 17.2%
        assert_eq!(resolved.tax_on(dec!(1000)), dec!(282));
        let resolved = resolver.resolve(&medium, as_of(), &high_bracket).unwrap();
        assert_eq!(resolved.income_tax, IncomeTaxTreatment::Progressive(dec!(0.15)));

        // Long band keeps its flat rate after the allowance
        let long = snapshot(WrapperType::LifeInsurance, date(2010, 1, 1));
        let resolved = resolver.resolve(&long, as_of(), &low_bracket).unwrap();
        assert_eq!(resolved.income_tax, IncomeTaxTreatment::Flat(dec!(0.075)));

        let flat = resolver
            .resolve(&short, as_of(), &TaxpayerContext::new(dec!(0.11)))
            .unwrap();
        assert_eq!(flat.income_tax, IncomeTaxTreatment::Flat(dec!(0.35)));
    }

    #[test]
    fn test_life_insurance_long_band_allowance() {
        let rules = WrapperRules::default();
        let resolver = WrapperRegimeResolver::new(&rules);
        let wrapper = snapshot(WrapperType::LifeInsurance, date(2010, 1, 1));

        let single = resolver.resolve(&wrapper, as_of(), &TaxpayerContext::new(dec!(0.30))).unwrap();
        assert_eq!(single.annual_allowance, Some(dec!(4600)));
        // (10 000 - 4 600) * 7.5% + 10 000 * 17.2%
        assert_eq!(single.tax_on(dec!(10000)), dec!(405) + dec!(1720));

        let couple = resolver
            .resolve(&wrapper, as_of(), &TaxpayerContext::new(dec!(0.30)).with_couple(true))
            .unwrap();
        assert_eq!(couple.annual_allowance, Some(dec!(9200)));
        // Gains under the allowance only bear social levies
        assert_eq!(couple.income_tax_on(dec!(2000)), dec!(0));
        assert_eq!(couple.tax_on(dec!(2000)), dec!(344));
    }

    #[test]
    fn test_life_insurance_interest_levy_regardless_of_band() {
        let rules = WrapperRules::default();
        let resolver = WrapperRegimeResolver::new(&rules);
        let context = TaxpayerContext::new(dec!(0.30));

        for opened in [date(2023, 1, 1), date(2018, 1, 1), date(2005, 1, 1)] {
            let wrapper = InvestmentWrapperSnapshot {
                secondary_allocation_ratio: Some(dec!(0.40)),
                ..snapshot(WrapperType::LifeInsurance, opened)
            };
            let resolved = resolver.resolve(&wrapper, as_of(), &context).unwrap();
            assert_eq!(resolved.interest_levy_ratio, Some(dec!(0.40)));
            assert_eq!(resolved.annual_interest_levy(dec!(1000)), dec!(68.8));
        }
    }

    #[test]
    fn test_retirement_exit_forms() {
        let rules = WrapperRules::default();
        let resolver = WrapperRegimeResolver::new(&rules);
        let wrapper = snapshot(WrapperType::Retirement, date(2015, 1, 1));

        let lump = resolver.resolve(&wrapper, as_of(), &TaxpayerContext::new(dec!(0.30))).unwrap();
        assert_eq!(lump.regime, Regime::RetirementLumpSum);
        assert_eq!(lump.headline_rate(), dec!(0.472));

        let annuity_context = |age| {
            TaxpayerContext::new(dec!(0.30))
                .with_retirement_exit(RetirementExit::Annuity { age_at_first_payment: age })
        };
        let cases = [(49, dec!(0.70)), (50, dec!(0.50)), (59, dec!(0.50)), (60, dec!(0.40)), (70, dec!(0.30)), (85, dec!(0.30))];
        for (age, fraction) in cases {
            let resolved = resolver.resolve(&wrapper, as_of(), &annuity_context(age)).unwrap();
            assert_eq!(resolved.regime, Regime::RetirementAnnuity);
            assert_eq!(resolved.taxable_fraction, fraction, "age {}", age);
        }

        let at_sixty = resolver.resolve(&wrapper, as_of(), &annuity_context(60)).unwrap();
        // 40% of 10 000 taxed at 30% + 17.2%
        assert_eq!(at_sixty.tax_on(dec!(10000)), dec!(1888));
    }

    #[test]
    fn test_retirement_deduction_ceiling() {
        let rules = WrapperRules::default();
        let resolver = WrapperRegimeResolver::new(&rules);

        let regular = resolver
            .retirement_deduction(dec!(10000), dec!(60000), dec!(0), dec!(0.30))
            .unwrap();
        assert_eq!(regular.ceiling, dec!(6000));
        assert_eq!(regular.total_available, dec!(6000));
        assert_eq!(regular.deductible_amount, dec!(6000));
        assert_eq!(regular.tax_saving, dec!(1800));
        assert_eq!(regular.net_cost, dec!(8200));

        let low_income = resolver
            .retirement_deduction(dec!(3000), dec!(10000), dec!(0), dec!(0.11))
            .unwrap();
        assert_eq!(low_income.ceiling, dec!(4637));
        assert_eq!(low_income.deductible_amount, dec!(3000));

        let high_income = resolver
            .retirement_deduction(dec!(50000), dec!(900000), dec!(0), dec!(0.45))
            .unwrap();
        assert_eq!(high_income.ceiling, dec!(35194));
    }

    #[test]
    fn test_retirement_deduction_carries_unused_ceilings() {
        let rules = WrapperRules::default();
        let resolver = WrapperRegimeResolver::new(&rules);

        let carried = resolver
            .retirement_deduction(dec!(10000), dec!(60000), dec!(3000), dec!(0.30))
            .unwrap();
        assert_eq!(carried.ceiling, dec!(6000));
        assert_eq!(carried.unused_prior_ceilings, dec!(3000));
        assert_eq!(carried.total_available, dec!(9000));
        assert_eq!(carried.deductible_amount, dec!(9000));
        assert_eq!(carried.tax_saving, dec!(2700));
        assert_eq!(carried.net_cost, dec!(7300));

        let ample = resolver
            .retirement_deduction(dec!(4000), dec!(60000), dec!(20000), dec!(0.30))
            .unwrap();
        assert_eq!(ample.total_available, dec!(26000));
        assert_eq!(ample.deductible_amount, dec!(4000));

        let err = resolver
            .retirement_deduction(dec!(4000), dec!(60000), dec!(-1), dec!(0.30))
            .unwrap_err();
        assert!(matches!(err, FiscalError::InvalidInput { .. }));
        assert!(resolver
            .retirement_deduction(dec!(4000), dec!(60000), Decimal::MAX, dec!(0.30))
            .is_err());
    }

    #[test]
    fn test_equity_savings_capacity() {
        let rules = WrapperRules::default();
        let resolver = WrapperRegimeResolver::new(&rules);

        let capacity = resolver.equity_savings_capacity(dec!(140000), dec!(20000)).unwrap();
        assert_eq!(capacity.remaining, dec!(10000));
        assert_eq!(capacity.accepted, dec!(10000));
        assert!(!capacity.within_ceiling);

        let full = resolver.equity_savings_capacity(dec!(150000), dec!(0)).unwrap();
        assert_eq!(full.remaining, dec!(0));
        assert!(full.within_ceiling);

        let huge = resolver.equity_savings_capacity(Decimal::MAX, Decimal::MAX).unwrap();
        assert_eq!(huge.accepted, dec!(0));
        assert!(!huge.within_ceiling);
    }

    #[test]
    fn test_invalid_inputs() {
        let rules = WrapperRules::default();
        let resolver = WrapperRegimeResolver::new(&rules);
        let context = TaxpayerContext::new(dec!(0.30));

        let negative = InvestmentWrapperSnapshot {
            valuation: dec!(-1),
            ..snapshot(WrapperType::Brokerage, date(2020, 1, 1))
        };
        let err = resolver.resolve(&negative, as_of(), &context).unwrap_err();
        assert!(matches!(err, FiscalError::InvalidInput { .. }));

        let future = snapshot(WrapperType::Brokerage, date(2030, 1, 1));
        assert!(resolver.resolve(&future, as_of(), &context).is_err());

        let bad_rate = TaxpayerContext::new(dec!(1.2));
        assert!(resolver
            .resolve(&snapshot(WrapperType::Brokerage, date(2020, 1, 1)), as_of(), &bad_rate)
            .is_err());
    }

    #[test]
    fn test_context_from_profile() {
        let scale = ProgressiveScale::from_pairs(&[
            (Some(dec!(11294)), dec!(0)),
            (Some(dec!(28797)), dec!(0.11)),
            (Some(dec!(82341)), dec!(0.30)),
            (None, dec!(0.41)),
        ])
        .unwrap();
        let profile = FiscalProfile::new(dec!(60000), dec!(2), MaritalStatus::Married, 0).unwrap();
        let context = TaxpayerContext::from_profile(&profile, &scale).unwrap();
        assert_eq!(context.marginal_rate, dec!(0.30));
        assert!(context.couple);
    }

    #[test]
    fn test_default_rules_valid() {
        assert!(WrapperRules::default().validate().is_ok());
    }
}
