//! ISIN validation
//!
//! An ISIN is a two-letter country prefix, nine alphanumerics and one check
//! digit computed with the Luhn algorithm over the numeric expansion of the
//! first eleven characters (`A` = 10 ... `Z` = 35).

use fiscal_core::{IdentifierRecord, LookupSource};
use serde::{Deserialize, Serialize};

/// Countries whose securities can enter an equity savings plan (EU/EEA)
pub const ELIGIBLE_COUNTRIES: [&str; 30] = [
    "FR", "DE", "IT", "ES", "NL", "BE", "AT", "IE", "PT", "FI", "GR", "LU", "DK", "SE", "PL",
    "CZ", "HU", "RO", "BG", "HR", "SK", "SI", "LT", "LV", "EE", "CY", "MT", "IS", "NO", "LI",
];

/// European exchange codes accepted for equity savings plans
pub const ELIGIBLE_EXCHANGES: [&str; 9] = ["PA", "BR", "MI", "AM", "DB", "SW", "LI", "VI", "HE"];

const ISIN_LEN: usize = 12;

/// Equity-savings eligibility verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    NotEligible,
    /// Classification data missing
    Unknown,
}

impl Eligibility {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Eligibility::Eligible => Some(true),
            Eligibility::NotEligible => Some(false),
            Eligibility::Unknown => None,
        }
    }
}

/// Trim and uppercase a user-supplied code.
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Two uppercase letters, nine uppercase alphanumerics, one digit.
pub fn validate_format(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == ISIN_LEN
        && bytes[..2].iter().all(u8::is_ascii_uppercase)
        && bytes[2..11]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        && bytes[11].is_ascii_digit()
}

/// Check digit for the first eleven characters of `code`.
///
/// Returns `None` when fewer than eleven characters are present or any of
/// them is not an uppercase letter or a digit.
pub fn checksum(code: &str) -> Option<u8> {
    let prefix = code.as_bytes().get(..ISIN_LEN - 1)?;

    let mut digits: Vec<u8> = Vec::with_capacity(22);
    for &b in prefix {
        match b {
            b'0'..=b'9' => digits.push(b - b'0'),
            b'A'..=b'Z' => {
                let value = b - b'A' + 10;
                digits.push(value / 10);
                digits.push(value % 10);
            }
            _ => return None,
        }
    }

    // Double every second digit starting from the rightmost one
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            let d = u32::from(d);
            if i % 2 == 0 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();

    Some(((10 - sum % 10) % 10) as u8)
}

/// Format valid and check digit matching.
pub fn is_valid(code: &str) -> bool {
    if !validate_format(code) {
        return false;
    }
    let expected = code.as_bytes()[ISIN_LEN - 1] - b'0';
    checksum(code) == Some(expected)
}

/// Equity-savings eligibility from the country prefix and, when known, the
/// market sector and listing exchange.
pub fn eligibility(code: &str, market_sector: Option<&str>, exchange_code: Option<&str>) -> Eligibility {
    let country = code.get(..2).unwrap_or_default();
    if !ELIGIBLE_COUNTRIES.iter().any(|c| *c == country) {
        return Eligibility::NotEligible;
    }

    let Some(sector) = market_sector else {
        return Eligibility::Unknown;
    };
    if !sector.to_ascii_lowercase().contains("equity") {
        return Eligibility::NotEligible;
    }

    match exchange_code {
        None => Eligibility::Eligible,
        Some(exchange) if ELIGIBLE_EXCHANGES.iter().any(|e| *e == exchange) => {
            Eligibility::Eligible
        }
        Some(_) => Eligibility::NotEligible,
    }
}

/// Offline record for `code`: format and checksum only, no enrichment.
pub fn inspect(code: &str) -> IdentifierRecord {
    let code = normalize(code);
    let country = code.get(..2).unwrap_or_default().to_string();

    let mut record = IdentifierRecord {
        code,
        country,
        is_format_valid: false,
        is_checksum_valid: false,
        is_valid: false,
        eligibility_flag: None,
        confidence: 0.0,
        source: LookupSource::Fallback,
        name: None,
        ticker: None,
        exchange_code: None,
        market_sector: None,
        security_type: None,
        warning: None,
    };

    if !validate_format(&record.code) {
        record.warning = Some("Invalid ISIN format".to_string());
        return record;
    }
    record.is_format_valid = true;

    if !is_valid(&record.code) {
        tracing::debug!("Checksum mismatch for {}", record.code);
        record.warning = Some("Invalid ISIN checksum".to_string());
        return record;
    }

    record.is_checksum_valid = true;
    record.is_valid = true;
    record.confidence = 0.5;
    record.eligibility_flag = eligibility(&record.code, None, None).as_flag();
    record.warning = Some("not enriched".to_string());
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: [&str; 6] = [
        "FR0010315770",
        "US0378331005",
        "DE0007164600",
        "IE00B4L5Y983",
        "LU0274208692",
        "GB0002634946",
    ];

    #[test]
    fn test_known_codes_are_valid() {
        for code in VALID {
            assert!(validate_format(code), "{}", code);
            assert!(is_valid(code), "{}", code);
        }
    }

    #[test]
    fn test_flipped_check_digit_is_invalid() {
        assert!(is_valid("FR0010315770"));
        assert!(!is_valid("FR0010315771"));
        assert!(validate_format("FR0010315771"));
    }

    #[test]
    fn test_check_digit_is_unique() {
        for code in VALID {
            let prefix = &code[..11];
            let accepted: Vec<char> = ('0'..='9')
                .filter(|d| is_valid(&format!("{}{}", prefix, d)))
                .collect();
            assert_eq!(accepted.len(), 1, "{}", code);
        }
    }

    #[test]
    fn test_single_digit_mutations_detected() {
        for code in VALID {
            for pos in 2..11 {
                let original = code.as_bytes()[pos];
                if !original.is_ascii_digit() {
                    continue;
                }
                for replacement in b'0'..=b'9' {
                    if replacement == original {
                        continue;
                    }
                    let mut mutated = code.as_bytes().to_vec();
                    mutated[pos] = replacement;
                    let mutated = String::from_utf8(mutated).unwrap();
                    assert!(!is_valid(&mutated), "{} -> {}", code, mutated);
                }
            }
        }
    }

    fn replace_at(code: &str, pos: usize, replacement: u8) -> String {
        let mut mutated = code.as_bytes().to_vec();
        mutated[pos] = replacement;
        String::from_utf8(mutated).unwrap()
    }

    #[test]
    fn test_letter_mutations_mostly_detected() {
        // Letters expand to two digits, so a few substitutions cancel out.
        // At most two of the 25 other letters slip through at any position.
        for code in VALID {
            for pos in 0..11 {
                let original = code.as_bytes()[pos];
                if !original.is_ascii_uppercase() {
                    continue;
                }
                let escaped: Vec<char> = (b'A'..=b'Z')
                    .filter(|&r| r != original && is_valid(&replace_at(code, pos, r)))
                    .map(char::from)
                    .collect();
                assert!(escaped.len() <= 2, "{} at {}: {:?}", code, pos, escaped);
            }
        }

        let escaped: Vec<char> = (b'A'..=b'Z')
            .filter(|&r| r != b'B' && is_valid(&replace_at("IE00B4L5Y983", 4, r)))
            .map(char::from)
            .collect();
        assert_eq!(escaped, vec!['P', 'U']);
        assert!(is_valid("NR0010315770"));
        assert!(!is_valid("FS0010315770"));
    }

    #[test]
    fn test_transposition_blind_spots() {
        // Swapping the country letters is never caught
        for code in VALID {
            let swapped = format!("{}{}{}", &code[1..2], &code[..1], &code[2..]);
            assert!(is_valid(&swapped), "{}", swapped);
        }
        assert!(is_valid("IE0B04L5Y983"));

        // Swapped digits are caught
        assert!(!is_valid("FR0001315770"));
        assert!(!is_valid("US3078331005"));
    }

    #[test]
    fn test_format_rules() {
        assert!(!validate_format("FR001031577"));
        assert!(!validate_format("FR00103157700"));
        assert!(!validate_format("fr0010315770"));
        assert!(!validate_format("F10010315770"));
        assert!(!validate_format("FR001031577A"));
        assert!(!validate_format("FR00103-5770"));
        assert!(!validate_format(""));
    }

    #[test]
    fn test_checksum_requires_alphanumeric_prefix() {
        assert_eq!(checksum("FR0010315770"), Some(0));
        assert_eq!(checksum("FR001031577"), Some(0));
        assert_eq!(checksum("fr001031577"), None);
        assert_eq!(checksum("FR00"), None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  fr0010315770 \n"), "FR0010315770");
        assert!(inspect(" fr0010315770").is_valid);
    }

    #[test]
    fn test_eligibility_rules() {
        assert_eq!(eligibility("US0378331005", Some("Equity"), Some("PA")), Eligibility::NotEligible);
        assert_eq!(eligibility("FR0010315770", None, Some("PA")), Eligibility::Unknown);
        assert_eq!(eligibility("FR0010315770", Some("Govt"), None), Eligibility::NotEligible);
        assert_eq!(eligibility("FR0010315770", Some("Equity"), None), Eligibility::Eligible);
        assert_eq!(eligibility("FR0010315770", Some("equity"), Some("PA")), Eligibility::Eligible);
        assert_eq!(eligibility("FR0010315770", Some("Equity"), Some("US")), Eligibility::NotEligible);
        assert_eq!(eligibility("", Some("Equity"), None), Eligibility::NotEligible);
    }

    #[test]
    fn test_inspect_outcomes() {
        let malformed = inspect("FR00");
        assert!(!malformed.is_format_valid);
        assert_eq!(malformed.confidence, 0.0);
        assert_eq!(malformed.warning.as_deref(), Some("Invalid ISIN format"));

        let bad_checksum = inspect("FR0010315771");
        assert!(bad_checksum.is_format_valid);
        assert!(!bad_checksum.is_checksum_valid);
        assert_eq!(bad_checksum.confidence, 0.0);

        let valid = inspect("FR0010315770");
        assert!(valid.is_checksum_valid);
        assert_eq!(valid.confidence, 0.5);
        assert_eq!(valid.source, LookupSource::Fallback);
        assert_eq!(valid.country, "FR");
        assert_eq!(valid.eligibility_flag, None);

        let foreign = inspect("US0378331005");
        assert_eq!(foreign.eligibility_flag, Some(false));
    }

    #[test]
    fn test_record_serializes_snake_case() {
        let json = serde_json::to_value(inspect("FR0010315770")).unwrap();
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["is_checksum_valid"], true);
    }
}
