//! Annual fiscal parameters
//!
//! Every bracket, threshold, rate and allowance used by the calculators.
//! Loaded once per process and shared read-only.

use std::path::Path;

use fiscal_core::{FiscalError, FiscalResult};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::income_tax::IncomeTaxCalculator;
use crate::scale::ProgressiveScale;
use crate::succession::{SuccessionDutyCalculator, SuccessionParameters};
use crate::tco::{ManagementFeeDefaults, TcoEngine};
use crate::wealth_tax::{WealthTaxCalculator, WealthTaxParameters};
use crate::wrapper::{WrapperRegimeResolver, WrapperRules};

pub const PARAMETERS_PATH_ENV: &str = "FISCAL_PARAMETERS_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalParameters {
    /// Tax year the tables apply to
    pub year: i32,
    pub income_tax_scale: ProgressiveScale,
    pub wealth_tax: WealthTaxParameters,
    pub succession: SuccessionParameters,
    pub wrappers: WrapperRules,
    pub management_fees: ManagementFeeDefaults,
}

impl Default for FiscalParameters {
    /// 2024 tables
    fn default() -> Self {
        Self {
            year: 2024,
            income_tax_scale: ProgressiveScale::from_trusted_pairs(&[
                (Some(dec!(11294)), dec!(0)),
                (Some(dec!(28797)), dec!(0.11)),
                (Some(dec!(82341)), dec!(0.30)),
                (Some(dec!(177106)), dec!(0.41)),
                (None, dec!(0.45)),
            ]),
            wealth_tax: WealthTaxParameters::default(),
            succession: SuccessionParameters::default(),
            wrappers: WrapperRules::default(),
            management_fees: ManagementFeeDefaults::default(),
        }
    }
}

impl FiscalParameters {
    pub fn validate(&self) -> FiscalResult<()> {
        ProgressiveScale::new(self.income_tax_scale.brackets().to_vec())?;
        self.wealth_tax.validate()?;
        self.succession.validate()?;
        self.wrappers.validate()?;
        self.management_fees.validate()
    }

    pub fn from_json_str(json: &str) -> FiscalResult<Self> {
        let params: FiscalParameters = serde_json::from_str(json)
            .map_err(|e| FiscalError::Parameters(format!("Failed to parse parameters: {}", e)))?;
        params.validate()?;
        Ok(params)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> FiscalResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            FiscalError::Parameters(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let params = Self::from_json_str(&json)?;
        tracing::info!("Loaded {} fiscal parameters from {}", params.year, path.display());
        Ok(params)
    }

    /// Load from `FISCAL_PARAMETERS_PATH` when set, else the built-in tables.
    pub fn from_env() -> FiscalResult<Self> {
        match std::env::var(PARAMETERS_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load_from_path(path.trim()),
            _ => {
                tracing::debug!("{} not set, using built-in tables", PARAMETERS_PATH_ENV);
                Ok(Self::default())
            }
        }
    }

    pub fn to_json_pretty(&self) -> FiscalResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| FiscalError::Parameters(format!("Failed to serialize parameters: {}", e)))
    }

    pub fn income_tax(&self) -> IncomeTaxCalculator<'_> {
        IncomeTaxCalculator::new(&self.income_tax_scale)
    }

    pub fn wealth_tax(&self) -> WealthTaxCalculator<'_> {
        WealthTaxCalculator::new(&self.wealth_tax)
    }

    pub fn succession(&self) -> SuccessionDutyCalculator<'_> {
        SuccessionDutyCalculator::new(&self.succession)
    }

    pub fn wrapper_resolver(&self) -> WrapperRegimeResolver<'_> {
        WrapperRegimeResolver::new(&self.wrappers)
    }

    pub fn tco(&self) -> TcoEngine<'_> {
        TcoEngine::new(&self.management_fees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fiscal_core::{FiscalProfile, MaritalStatus};

    #[test]
    fn test_builtin_tables_are_valid() {
        let params = FiscalParameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.year, 2024);
    }

    #[test]
    fn test_json_round_trip_preserves_tables() {
        let params = FiscalParameters::default();
        let json = params.to_json_pretty().unwrap();
        let parsed = FiscalParameters::from_json_str(&json).unwrap();
        assert_eq!(parsed.income_tax_scale, params.income_tax_scale);
        assert_eq!(parsed.succession.abatement_renewal_years, 15);
    }

    #[test]
    fn test_rejects_malformed_scale_in_file() {
        let mut value = serde_json::to_value(FiscalParameters::default()).unwrap();
        value["income_tax_scale"] = serde_json::json!([{ "upper_bound": 1000, "rate": 0.1 }]);
        let err = FiscalParameters::from_json_str(&value.to_string()).unwrap_err();
        assert!(matches!(err, FiscalError::Parameters(_)));
    }

    #[test]
    fn test_rejects_inconsistent_thresholds() {
        let mut params = FiscalParameters::default();
        params.wealth_tax.decote_band_upper = params.wealth_tax.entry_threshold;
        let json = serde_json::to_string(&params).unwrap();
        let err = FiscalParameters::from_json_str(&json).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_missing_file() {
        let err = FiscalParameters::load_from_path("/nonexistent/fiscal-parameters.json").unwrap_err();
        assert!(matches!(err, FiscalError::Parameters(_)));
    }

    #[test]
    fn test_calculators_share_tables() {
        let params = FiscalParameters::default();
        let profile = FiscalProfile::with_standard_parts(dec!(60000), MaritalStatus::Married, 0).unwrap();
        let result = params.income_tax().compute(&profile).unwrap();
        // 17 503 * 11% + 1 203 * 30% per part
        assert_eq!(result.tax_per_part, dec!(2286.23));
        assert_eq!(result.gross_tax, dec!(4572.46));
    }
}
