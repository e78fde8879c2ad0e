//! Wealth Tax Calculator
//!
//! Net real-estate worth tax with an entry threshold and a decote band that
//! smooths the liability from zero at the threshold up to the full scale
//! amount at the top of the band.

use fiscal_core::{ensure_non_negative, FiscalError, FiscalResult, Money, WealthAssessmentInput};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::scale::ProgressiveScale;

/// Scale and thresholds for the wealth tax
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WealthTaxParameters {
    pub scale: ProgressiveScale,
    /// Worth below this amount owes nothing
    pub entry_threshold: Money,
    /// Upper edge of the decote band
    pub decote_band_upper: Money,
}

impl WealthTaxParameters {
    pub fn validate(&self) -> FiscalResult<()> {
        ProgressiveScale::new(self.scale.brackets().to_vec())?;
        ensure_non_negative("entry_threshold", self.entry_threshold)?;
        if self.entry_threshold >= self.decote_band_upper {
            return Err(FiscalError::Configuration(format!(
                "decote band upper edge {} must exceed the entry threshold {}",
                self.decote_band_upper, self.entry_threshold
            )));
        }
        Ok(())
    }
}

impl Default for WealthTaxParameters {
    fn default() -> Self {
        Self {
            scale: ProgressiveScale::from_trusted_pairs(&[
                (Some(dec!(800000)), dec!(0)),
                (Some(dec!(1300000)), dec!(0.005)),
                (Some(dec!(2570000)), dec!(0.007)),
                (Some(dec!(5000000)), dec!(0.01)),
                (Some(dec!(10000000)), dec!(0.0125)),
                (None, dec!(0.015)),
            ]),
            entry_threshold: dec!(1300000),
            decote_band_upper: dec!(1400000),
        }
    }
}

/// Wealth tax outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WealthTaxResult {
    pub net_worth: Money,
    /// Worth reaches the entry threshold
    pub applicable: bool,
    /// Scale amount before any decote
    pub gross_tax: Money,
    /// Reduction subtracted inside the decote band
    pub decote: Money,
    pub tax_due: Money,
    /// Worth lies within `[entry_threshold, decote_band_upper]`
    pub decote_applied: bool,
}

impl WealthTaxResult {
    fn not_applicable(net_worth: Money) -> Self {
        Self {
            net_worth,
            applicable: false,
            gross_tax: Decimal::ZERO,
            decote: Decimal::ZERO,
            tax_due: Decimal::ZERO,
            decote_applied: false,
        }
    }
}

pub struct WealthTaxCalculator<'a> {
    params: &'a WealthTaxParameters,
}

impl<'a> WealthTaxCalculator<'a> {
    pub fn new(params: &'a WealthTaxParameters) -> Self {
        Self { params }
    }

    pub fn compute(&self, input: &WealthAssessmentInput) -> FiscalResult<WealthTaxResult> {
        compute_wealth_tax(
            input,
            &self.params.scale,
            self.params.entry_threshold,
            self.params.decote_band_upper,
        )
    }
}

/// Compute the wealth tax.
///
/// Inside `[entry_threshold, decote_band_upper]` the scale is evaluated first,
/// then reduced by `T(entry) * (upper - worth) / (upper - entry)`, where
/// `T(entry)` is the scale amount at the threshold. The result is exactly zero
/// at the threshold and exactly the undiscounted amount at the band's top.
pub fn compute_wealth_tax(
    input: &WealthAssessmentInput,
    scale: &ProgressiveScale,
    entry_threshold: Money,
    decote_band_upper: Money,
) -> FiscalResult<WealthTaxResult> {
    let net_worth = input.net_real_estate_worth;
    ensure_non_negative("net_real_estate_worth", net_worth)?;
    if entry_threshold >= decote_band_upper {
        return Err(FiscalError::Configuration(format!(
            "decote band upper edge {} must exceed the entry threshold {}",
            decote_band_upper, entry_threshold
        )));
    }

    if net_worth < entry_threshold {
        return Ok(WealthTaxResult::not_applicable(net_worth));
    }

    let gross_tax = scale.evaluate(net_worth);
    let in_band = net_worth <= decote_band_upper;
    let decote = if in_band {
        let at_threshold = scale.evaluate(entry_threshold);
        at_threshold * (decote_band_upper - net_worth) / (decote_band_upper - entry_threshold)
    } else {
        Decimal::ZERO
    };
    let tax_due = (gross_tax - decote).max(Decimal::ZERO);

    tracing::debug!(
        "Wealth tax: worth={} gross={} decote={} due={}",
        net_worth,
        gross_tax,
        decote,
        tax_due
    );

    Ok(WealthTaxResult {
        net_worth,
        applicable: true,
        gross_tax,
        decote,
        tax_due,
        decote_applied: in_band,
    })
}
