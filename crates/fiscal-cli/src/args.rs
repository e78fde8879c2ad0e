use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// `--flag value` arguments following the command name
pub struct Args {
    args: Vec<String>,
}

impl Args {
    pub fn new(args: Vec<String>) -> Self {
        Self { args }
    }

    pub fn has(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    pub fn value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .filter(|v| !v.starts_with("--"))
            .map(|s| s.as_str())
    }

    pub fn required(&self, flag: &str) -> Result<&str> {
        self.value(flag)
            .ok_or_else(|| anyhow!("missing required argument {}", flag))
    }

    pub fn parse<T>(&self, flag: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.value(flag)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|e| anyhow!("invalid value '{}' for {}: {}", v, flag, e))
            })
            .transpose()
    }

    pub fn parse_required<T>(&self, flag: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.parse(flag)?
            .ok_or_else(|| anyhow!("missing required argument {}", flag))
    }

    pub fn decimal(&self, flag: &str) -> Result<Option<Decimal>> {
        self.parse::<Decimal>(flag)
    }

    pub fn decimal_required(&self, flag: &str) -> Result<Decimal> {
        self.parse_required::<Decimal>(flag)
    }

    pub fn date(&self, flag: &str) -> Result<Option<NaiveDate>> {
        self.value(flag)
            .map(|v| {
                NaiveDate::parse_from_str(v, "%Y-%m-%d")
                    .with_context(|| format!("invalid date '{}' for {} (expected YYYY-MM-DD)", v, flag))
            })
            .transpose()
    }

    pub fn date_required(&self, flag: &str) -> Result<NaiveDate> {
        self.date(flag)?
            .ok_or_else(|| anyhow!("missing required argument {}", flag))
    }

    /// Arguments that are neither flags nor flag values
    pub fn positional(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut skip_next = false;
        for arg in &self.args {
            if skip_next {
                skip_next = false;
                continue;
            }
            if arg.starts_with("--") {
                skip_next = !is_switch(arg);
                continue;
            }
            out.push(arg.clone());
        }
        out
    }
}

/// Flags that take no value
fn is_switch(flag: &str) -> bool {
    matches!(flag, "--progressive" | "--couple" | "--help")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn args(raw: &[&str]) -> Args {
        Args::new(raw.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_values_and_switches() {
        let a = args(&["--income", "60000", "--progressive", "--parts", "2.5"]);
        assert_eq!(a.decimal_required("--income").unwrap(), dec!(60000));
        assert_eq!(a.decimal("--parts").unwrap(), Some(dec!(2.5)));
        assert!(a.has("--progressive"));
        assert_eq!(a.decimal("--missing").unwrap(), None);
        assert!(a.decimal_required("--missing").is_err());
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let a = args(&["--income", "lots", "--opened", "2020-13-01"]);
        assert!(a.decimal("--income").is_err());
        assert!(a.date("--opened").is_err());
    }

    #[test]
    fn test_positional() {
        let a = args(&["FR0010315770", "--progressive", "US0378331005", "--as-of", "2024-01-01", "DE0007164600"]);
        assert_eq!(a.positional(), vec!["FR0010315770", "US0378331005", "DE0007164600"]);
    }
}
