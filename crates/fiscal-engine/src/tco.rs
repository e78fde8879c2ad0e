//! Total Cost of Ownership
//!
//! Annual cost of holding a wrapper: management fees, tax on the expected
//! yield and the opportunity cost of the capital.

use fiscal_core::{
    ensure_rate, FiscalError, FiscalResult, InvestmentWrapperSnapshot, Money, Rate,
    WrapperType,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::wrapper::ResolvedRegime;

/// Default annual management fee by wrapper type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagementFeeDefaults {
    pub equity_savings: Rate,
    pub brokerage: Rate,
    pub life_insurance: Rate,
    pub retirement: Rate,
}

impl ManagementFeeDefaults {
    pub fn rate_for(&self, wrapper_type: WrapperType) -> Rate {
        match wrapper_type {
            WrapperType::EquitySavings => self.equity_savings,
            WrapperType::Brokerage => self.brokerage,
            WrapperType::LifeInsurance => self.life_insurance,
            WrapperType::Retirement => self.retirement,
        }
    }

    pub fn validate(&self) -> FiscalResult<()> {
        for wrapper_type in WrapperType::ALL {
            let rate = self.rate_for(wrapper_type);
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(FiscalError::Configuration(format!(
                    "default fee for {} must be within [0, 1] (got {})",
                    wrapper_type, rate
                )));
            }
        }
        Ok(())
    }
}

impl Default for ManagementFeeDefaults {
    fn default() -> Self {
        Self {
            equity_savings: dec!(0.003),
            brokerage: dec!(0.002),
            life_insurance: dec!(0.015),
            retirement: dec!(0.012),
        }
    }
}

/// Cost components; `total` is always the exact sum of the three others
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TcoBreakdown {
    pub management_fee_drag: Money,
    pub tax_drag: Money,
    pub opportunity_cost: Money,
    pub total: Money,
}

impl TcoBreakdown {
    pub fn new(management_fee_drag: Money, tax_drag: Money, opportunity_cost: Money) -> Self {
        Self {
            management_fee_drag,
            tax_drag,
            opportunity_cost,
            total: management_fee_drag + tax_drag + opportunity_cost,
        }
    }

    /// Total over the valuation it was computed on
    pub fn cost_ratio(&self, valuation: Money) -> Rate {
        crate::scale::average_rate(self.total, valuation)
    }
}

impl std::ops::Add for TcoBreakdown {
    type Output = TcoBreakdown;

    fn add(self, other: TcoBreakdown) -> TcoBreakdown {
        TcoBreakdown::new(
            self.management_fee_drag + other.management_fee_drag,
            self.tax_drag + other.tax_drag,
            self.opportunity_cost + other.opportunity_cost,
        )
    }
}

pub struct TcoEngine<'a> {
    fees: &'a ManagementFeeDefaults,
}

impl<'a> TcoEngine<'a> {
    pub fn new(fees: &'a ManagementFeeDefaults) -> Self {
        Self { fees }
    }

    pub fn default_fee_rate(&self, wrapper_type: WrapperType) -> Rate {
        self.fees.rate_for(wrapper_type)
    }

    pub fn compute(
        &self,
        snapshot: &InvestmentWrapperSnapshot,
        resolved: &ResolvedRegime,
        fee_rate_annual: Rate,
        opportunity_cost_rate: Rate,
    ) -> FiscalResult<TcoBreakdown> {
        compute_tco(snapshot, resolved, fee_rate_annual, opportunity_cost_rate)
    }

    /// Same as [`compute`](Self::compute) with the wrapper type's default fee.
    pub fn compute_with_default_fee(
        &self,
        snapshot: &InvestmentWrapperSnapshot,
        resolved: &ResolvedRegime,
        opportunity_cost_rate: Rate,
    ) -> FiscalResult<TcoBreakdown> {
        let fee_rate = self.default_fee_rate(snapshot.wrapper_type);
        compute_tco(snapshot, resolved, fee_rate, opportunity_cost_rate)
    }
}

/// Compute the annual cost of holding `snapshot` under `resolved`.
pub fn compute_tco(
    snapshot: &InvestmentWrapperSnapshot,
    resolved: &ResolvedRegime,
    fee_rate_annual: Rate,
    opportunity_cost_rate: Rate,
) -> FiscalResult<TcoBreakdown> {
    snapshot.validate()?;
    ensure_rate("fee_rate_annual", fee_rate_annual)?;
    ensure_rate("opportunity_cost_rate", opportunity_cost_rate)?;
    if resolved.wrapper_type != snapshot.wrapper_type {
        return Err(FiscalError::Configuration(format!(
            "regime resolved for {} applied to a {} wrapper",
            resolved.wrapper_type, snapshot.wrapper_type
        )));
    }

    let management_fee_drag = snapshot.valuation * fee_rate_annual;
    let tax_drag = resolved.tax_on(snapshot.annual_gain());
    let opportunity_cost = snapshot.valuation * opportunity_cost_rate;

    // Rates are bounded, so only the sum of the parts can overflow
    management_fee_drag
        .checked_add(tax_drag)
        .and_then(|sum| sum.checked_add(opportunity_cost))
        .ok_or_else(|| {
            FiscalError::invalid_input(
                "valuation",
                format!("{} is too large to total", snapshot.valuation),
            )
        })?;

    let breakdown = TcoBreakdown::new(management_fee_drag, tax_drag, opportunity_cost);
    tracing::debug!(
        "TCO {}: fees={} tax={} opportunity={} total={}",
        snapshot.wrapper_type,
        breakdown.management_fee_drag,
        breakdown.tax_drag,
        breakdown.opportunity_cost,
        breakdown.total
    );
    Ok(breakdown)
}

/// Field-by-field sum of several breakdowns.
pub fn aggregate<'b>(breakdowns: impl IntoIterator<Item = &'b TcoBreakdown>) -> TcoBreakdown {
    breakdowns
        .into_iter()
        .cloned()
        .fold(TcoBreakdown::default(), |acc, b| acc + b)
}
