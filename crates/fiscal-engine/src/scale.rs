//! Progressive Scale
//!
//! Piecewise bracket schedules shared by every calculator in the engine.

use fiscal_core::{FiscalError, FiscalResult, Money, Rate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One bracket of a progressive scale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    /// Inclusive upper edge; `None` marks the open-ended top bracket
    pub upper_bound: Option<Money>,
    /// Rate applied to the slice of the base inside this bracket
    pub rate: Rate,
}

impl TaxBracket {
    pub fn bounded(upper_bound: Money, rate: Rate) -> Self {
        Self {
            upper_bound: Some(upper_bound),
            rate,
        }
    }

    pub fn unbounded(rate: Rate) -> Self {
        Self {
            upper_bound: None,
            rate,
        }
    }
}

/// Slice of a base taxed inside one bracket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketSlice {
    pub lower_bound: Money,
    pub upper_bound: Option<Money>,
    pub rate: Rate,
    pub taxed_amount: Money,
    pub tax: Money,
}

/// Ordered, validated bracket schedule.
///
/// Upper bounds are strictly increasing and exactly one bracket, the last,
/// is unbounded. Scales are immutable once built and meant to be shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TaxBracket>", into = "Vec<TaxBracket>")]
pub struct ProgressiveScale {
    brackets: Vec<TaxBracket>,
}

impl ProgressiveScale {
    pub fn new(brackets: Vec<TaxBracket>) -> FiscalResult<Self> {
        if brackets.is_empty() {
            return Err(FiscalError::Configuration(
                "a progressive scale needs at least one bracket".to_string(),
            ));
        }

        let last = brackets.len() - 1;
        let mut previous = Decimal::ZERO;
        for (i, bracket) in brackets.iter().enumerate() {
            if bracket.rate < Decimal::ZERO || bracket.rate > Decimal::ONE {
                return Err(FiscalError::Configuration(format!(
                    "bracket {} has rate {} outside [0, 1]",
                    i + 1,
                    bracket.rate
                )));
            }
            match bracket.upper_bound {
                Some(upper) if i == last => {
                    return Err(FiscalError::Configuration(format!(
                        "last bracket must be unbounded (found upper bound {})",
                        upper
                    )));
                }
                Some(upper) if upper <= previous => {
                    return Err(FiscalError::Configuration(format!(
                        "bracket {} upper bound {} does not exceed {}",
                        i + 1,
                        upper,
                        previous
                    )));
                }
                Some(upper) => previous = upper,
                None if i != last => {
                    return Err(FiscalError::Configuration(format!(
                        "bracket {} is unbounded but is not the last bracket",
                        i + 1
                    )));
                }
                None => {}
            }
        }

        Ok(Self { brackets })
    }

    /// Build from `(upper_bound, rate)` pairs.
    pub fn from_pairs(pairs: &[(Option<Money>, Rate)]) -> FiscalResult<Self> {
        Self::new(
            pairs
                .iter()
                .map(|&(upper_bound, rate)| TaxBracket { upper_bound, rate })
                .collect(),
        )
    }

    /// Build a built-in table without validation. `FiscalParameters::validate`
    /// re-checks every built-in scale in tests.
    pub(crate) fn from_trusted_pairs(pairs: &[(Option<Money>, Rate)]) -> Self {
        Self {
            brackets: pairs
                .iter()
                .map(|&(upper_bound, rate)| TaxBracket { upper_bound, rate })
                .collect(),
        }
    }

    /// Single open-ended bracket at `rate`.
    pub fn flat(rate: Rate) -> FiscalResult<Self> {
        Self::new(vec![TaxBracket::unbounded(rate)])
    }

    /// Single open-ended bracket at 0%.
    pub fn exempt() -> Self {
        Self {
            brackets: vec![TaxBracket::unbounded(Decimal::ZERO)],
        }
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    /// Tax due on `base`. A base equal to an upper bound is taxed entirely in
    /// the lower bracket.
    pub fn evaluate(&self, base: Money) -> Money {
        self.breakdown(base).iter().map(|slice| slice.tax).sum()
    }

    /// Rate of the bracket containing `base`.
    pub fn marginal_rate(&self, base: Money) -> Rate {
        self.brackets
            .iter()
            .find(|b| b.upper_bound.map_or(true, |upper| base <= upper))
            .or_else(|| self.brackets.last())
            .map(|b| b.rate)
            .unwrap_or(Decimal::ZERO)
    }

    /// Per-bracket slices of `base`, skipping empty slices.
    pub fn breakdown(&self, base: Money) -> Vec<BracketSlice> {
        let mut slices = Vec::new();
        if base <= Decimal::ZERO {
            return slices;
        }

        let mut lower = Decimal::ZERO;
        for bracket in &self.brackets {
            let upper = bracket.upper_bound.map_or(base, |u| u.min(base));
            if upper > lower {
                let taxed_amount = upper - lower;
                slices.push(BracketSlice {
                    lower_bound: lower,
                    upper_bound: bracket.upper_bound,
                    rate: bracket.rate,
                    taxed_amount,
                    tax: taxed_amount * bracket.rate,
                });
            }

            match bracket.upper_bound {
                Some(u) if base > u => lower = u,
                _ => break,
            }
        }

        slices
    }
}

impl TryFrom<Vec<TaxBracket>> for ProgressiveScale {
    type Error = FiscalError;

    fn try_from(brackets: Vec<TaxBracket>) -> Result<Self, Self::Error> {
        Self::new(brackets)
    }
}

impl From<ProgressiveScale> for Vec<TaxBracket> {
    fn from(scale: ProgressiveScale) -> Self {
        scale.brackets
    }
}

/// Tax due on `base` under `scale`; 0 for a non-positive base.
pub fn evaluate(scale: &ProgressiveScale, base: Money) -> Money {
    scale.evaluate(base)
}

/// Rate of the bracket containing `base`.
pub fn marginal_rate(scale: &ProgressiveScale, base: Money) -> Rate {
    scale.marginal_rate(base)
}

/// Per-bracket slices of `base`; their taxes sum to [`evaluate`].
pub fn bracket_breakdown(scale: &ProgressiveScale, base: Money) -> Vec<BracketSlice> {
    scale.breakdown(base)
}

/// `tax / base`, 0 when the base is zero.
pub fn average_rate(tax: Money, base: Money) -> Rate {
    if base.is_zero() {
        Decimal::ZERO
    } else {
        tax / base
    }
}
