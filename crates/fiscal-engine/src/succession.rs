//! Succession Duty Calculator
//!
//! Per-heir abatement followed by the heir class's own progressive scale.

use chrono::NaiveDate;
use fiscal_core::{
    ensure_non_negative, whole_years_between, FiscalError, FiscalResult, HeirClass, Money, Rate,
    SuccessionTransfer,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::scale::{average_rate, ProgressiveScale};

/// Abatement and scale for one heir class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeirSchedule {
    pub heir_class: HeirClass,
    /// Full abatement available per heir and renewal window
    pub abatement: Money,
    pub scale: ProgressiveScale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessionParameters {
    pub schedules: Vec<HeirSchedule>,
    /// Whole years after which an heir's abatement is available again
    pub abatement_renewal_years: u32,
}

impl SuccessionParameters {
    pub fn schedule(&self, heir_class: HeirClass) -> FiscalResult<&HeirSchedule> {
        self.schedules
            .iter()
            .find(|s| s.heir_class == heir_class)
            .ok_or_else(|| {
                FiscalError::Configuration(format!("no succession schedule for heir class {}", heir_class))
            })
    }

    pub fn validate(&self) -> FiscalResult<()> {
        for heir_class in HeirClass::ALL {
            let schedule = self.schedule(heir_class)?;
            ensure_non_negative("abatement", schedule.abatement)?;
            ProgressiveScale::new(schedule.scale.brackets().to_vec())?;
        }
        Ok(())
    }
}

impl Default for SuccessionParameters {
    fn default() -> Self {
        Self {
            schedules: vec![
                HeirSchedule {
                    heir_class: HeirClass::Spouse,
                    abatement: dec!(80724),
                    scale: ProgressiveScale::exempt(),
                },
                HeirSchedule {
                    heir_class: HeirClass::DirectLine,
                    abatement: dec!(100000),
                    scale: ProgressiveScale::from_trusted_pairs(&[
                        (Some(dec!(8072)), dec!(0.05)),
                        (Some(dec!(12109)), dec!(0.10)),
                        (Some(dec!(15932)), dec!(0.15)),
                        (Some(dec!(552324)), dec!(0.20)),
                        (Some(dec!(902838)), dec!(0.30)),
                        (Some(dec!(1805677)), dec!(0.40)),
                        (None, dec!(0.45)),
                    ]),
                },
                HeirSchedule {
                    heir_class: HeirClass::Sibling,
                    abatement: dec!(15932),
                    scale: ProgressiveScale::from_trusted_pairs(&[
                        (Some(dec!(24430)), dec!(0.35)),
                        (None, dec!(0.45)),
                    ]),
                },
                HeirSchedule {
                    heir_class: HeirClass::NephewNiece,
                    abatement: dec!(7967),
                    scale: ProgressiveScale::from_trusted_pairs(&[(None, dec!(0.55))]),
                },
                HeirSchedule {
                    heir_class: HeirClass::Other,
                    abatement: dec!(1594),
                    scale: ProgressiveScale::from_trusted_pairs(&[(None, dec!(0.60))]),
                },
            ],
            abatement_renewal_years: 15,
        }
    }
}

/// Duty owed on one transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessionResult {
    pub heir_class: HeirClass,
    pub amount: Money,
    pub abatement_used: Money,
    pub taxable_base: Money,
    pub duty_due: Money,
    /// Duty over the transferred amount
    pub effective_rate: Rate,
}

pub struct SuccessionDutyCalculator<'a> {
    params: &'a SuccessionParameters,
}

impl<'a> SuccessionDutyCalculator<'a> {
    pub fn new(params: &'a SuccessionParameters) -> Self {
        Self { params }
    }

    pub fn compute(&self, transfer: &SuccessionTransfer) -> FiscalResult<SuccessionResult> {
        ensure_non_negative("amount", transfer.amount)?;
        ensure_non_negative("abatement_remaining", transfer.abatement_remaining)?;
        let schedule = self.params.schedule(transfer.heir_class)?;

        let abatement_used = transfer.amount.min(transfer.abatement_remaining);
        let taxable_base = (transfer.amount - abatement_used).max(Decimal::ZERO);
        let duty_due = schedule.scale.evaluate(taxable_base);

        tracing::debug!(
            "Succession duty: heir={} amount={} abatement={} base={} duty={}",
            transfer.heir_class,
            transfer.amount,
            abatement_used,
            taxable_base,
            duty_due
        );

        Ok(SuccessionResult {
            heir_class: transfer.heir_class,
            amount: transfer.amount,
            abatement_used,
            taxable_base,
            duty_due,
            effective_rate: average_rate(duty_due, transfer.amount),
        })
    }

    /// Abatement still available to an heir, from the history the caller keeps.
    ///
    /// Once the renewal window has fully elapsed since the last transfer the
    /// whole abatement is available again.
    pub fn remaining_abatement(
        &self,
        heir_class: HeirClass,
        last_transfer: Option<NaiveDate>,
        used_in_window: Money,
        as_of: NaiveDate,
    ) -> FiscalResult<Money> {
        ensure_non_negative("used_in_window", used_in_window)?;
        let full = self.params.schedule(heir_class)?.abatement;

        let renewed = match last_transfer {
            None => true,
            Some(date) => whole_years_between(date, as_of)? >= self.params.abatement_renewal_years,
        };

        if renewed {
            Ok(full)
        } else {
            Ok((full - used_in_window).max(Decimal::ZERO))
        }
    }
}
