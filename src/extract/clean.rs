use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::dataset::NumericCell;
use crate::error::{EtlError, Result};

static FOOTNOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[[^\]]*\]").unwrap());

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹'];

/// How a raw numeric cell is normalized.
///
/// A cell equal to one of `no_data` is null. A cell equal to one of
/// `zero_tokens` is a declared zero. Both comparisons run on the cell after
/// footnotes, currency symbols, whitespace and thousands separators are removed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CleanRules {
    pub thousands_separators: Vec<char>,
    pub no_data: Vec<String>,
    pub zero_tokens: Vec<String>,
    pub divisor: Option<f64>,
    pub precision: u32,
}

impl Default for CleanRules {
    fn default() -> Self {
        CleanRules {
            thousands_separators: vec![','],
            no_data: vec!["—".into(), "–".into(), "N/A".into(), "n/a".into()],
            zero_tokens: Vec::new(),
            divisor: None,
            precision: 2,
        }
    }
}

pub struct RecordCleaner {
    rules: CleanRules,
}

impl RecordCleaner {
    pub fn new(rules: CleanRules) -> Self {
        RecordCleaner { rules }
    }

    /// Never fails: unparseable text becomes a null cell.
    pub fn clean(&self, raw: &str) -> NumericCell {
        match self.try_clean(raw) {
            Ok(cell) => cell,
            Err(e) => {
                debug!("{}, storing null", e);
                NumericCell::NULL
            }
        }
    }

    fn try_clean(&self, raw: &str) -> Result<NumericCell> {
        let text = self.normalize(raw);
        if self.rules.no_data.iter().any(|m| *m == text) {
            return Ok(NumericCell::NULL);
        }
        let text = if self.rules.zero_tokens.iter().any(|z| *z == text) {
            "0"
        } else {
            text.as_str()
        };

        let mut value: f64 = text.parse().map_err(|_| EtlError::ParseFailure {
            raw: raw.to_string(),
        })?;
        if let Some(divisor) = self.rules.divisor.filter(|d| *d != 0.0) {
            value /= divisor;
        }
        Ok(NumericCell::rounded(value, self.rules.precision))
    }

    fn normalize(&self, raw: &str) -> String {
        FOOTNOTE_RE
            .replace_all(raw, "")
            .chars()
            .filter(|c| {
                !c.is_whitespace()
                    && !CURRENCY_SYMBOLS.contains(c)
                    && !self.rules.thousands_separators.contains(c)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millions_to_billions() -> RecordCleaner {
        RecordCleaner::new(CleanRules {
            divisor: Some(1000.0),
            ..CleanRules::default()
        })
    }

    #[test]
    fn strips_separators_and_rescales() {
        let c = millions_to_billions();
        assert_eq!(c.clean("1,234.5").value(), Some(1.23));
        assert_eq!(c.clean("26,854,599").value(), Some(26854.6));
    }

    #[test]
    fn no_data_markers_are_null_not_zero() {
        let c = millions_to_billions();
        for raw in ["—", " – ", "N/A", "—[n 1]"] {
            assert!(c.clean(raw).is_null(), "{raw:?} should be null");
        }
    }

    #[test]
    fn garbage_is_null() {
        let c = RecordCleaner::new(CleanRules::default());
        assert!(c.clean("n.a.").is_null());
        assert!(c.clean("").is_null());
        assert!(c.clean("NaN").is_null());
    }

    #[test]
    fn zero_token_is_whole_cell_only() {
        let c = RecordCleaner::new(CleanRules {
            zero_tokens: vec!["-".into()],
            ..CleanRules::default()
        });
        assert_eq!(c.clean(" - ").value(), Some(0.0));
        // A leading minus is not a zero token; negatives are outside the cell domain.
        assert!(c.clean("-5").is_null());
    }

    #[test]
    fn footnotes_and_currency_removed() {
        let c = RecordCleaner::new(CleanRules::default());
        assert_eq!(c.clean("$1,204.12[3]").value(), Some(1204.12));
        assert_eq!(c.clean("2\u{a0}081.5").value(), Some(2081.5));
    }

    #[test]
    fn rounds_to_configured_precision() {
        let c = RecordCleaner::new(CleanRules {
            precision: 1,
            ..CleanRules::default()
        });
        assert_eq!(c.clean("12.25").value(), Some(12.3));
    }
}
