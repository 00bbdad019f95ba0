// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Raw price text → integer amount.

use crate::error::{MonitorError, MonitorResult};
use crate::keys::SearchKey;
use serde::Serialize;

/// Raw text pulled from a rendered page for one key. `None` means extraction failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObservation {
    pub key: SearchKey,
    pub raw_text: Option<String>,
}

/// Normalized price for one key. `None` means the raw text was missing or unparseable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceObservation {
    pub key: SearchKey,
    pub amount: Option<u64>,
}

/// Parse a displayed price such as `"8 750 kr"` or `"kr 12,300"` into whole currency units.
///
/// The currency marker, whitespace (including non-breaking spaces) and comma separators
/// are removed first, then every remaining non-digit. Returns `None` when no digits are
/// left or the number does not fit in a `u64`.
pub fn normalize(raw_text: &str, currency_marker: &str) -> Option<u64> {
    let stripped = if currency_marker.is_empty() {
        raw_text.to_string()
    } else {
        raw_text.replace(currency_marker, "")
    };

    let digits: String = stripped
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .filter(char::is_ascii_digit)
        .collect();

    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok()
}

/// [`normalize`] for one key, with a [`MonitorError::Parse`] naming the key on failure.
pub fn parse_price(key: &SearchKey, text: &str, currency_marker: &str) -> MonitorResult<u64> {
    normalize(text, currency_marker).ok_or_else(|| MonitorError::Parse {
        key: key.to_string(),
        raw: text.to_string(),
    })
}

/// Normalize a batch, logging every observation that cannot be used.
pub fn normalize_all(raw: &[RawObservation], currency_marker: &str) -> Vec<PriceObservation> {
    raw.iter()
        .map(|obs| {
            let amount = match &obs.raw_text {
                None => {
                    tracing::warn!(key = %obs.key, stage = "normalize", "no raw price for key");
                    None
                }
                Some(text) => match parse_price(&obs.key, text, currency_marker) {
                    Ok(value) => {
                        tracing::info!(key = %obs.key, raw = %text, price = value, "parsed price");
                        Some(value)
                    }
                    Err(err) => {
                        tracing::warn!(
                            key = %obs.key,
                            stage = err.stage(),
                            error = %err,
                            "unable to parse price"
                        );
                        None
                    }
                },
            };
            PriceObservation {
                key: obs.key.clone(),
                amount,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_normalize_marker_after() {
        assert_eq!(normalize("8 750 kr", "kr"), Some(8750));
        assert_eq!(normalize("8\u{a0}750\u{a0}kr", "kr"), Some(8750));
    }

    #[test]
    fn test_normalize_marker_before() {
        assert_eq!(normalize("kr 12,300", "kr"), Some(12300));
    }

    #[test]
    fn test_normalize_rejects_text() {
        assert_eq!(normalize("no price here", "kr"), None);
        assert_eq!(normalize("kr", "kr"), None);
        assert_eq!(normalize("", "kr"), None);
    }

    #[test]
    fn test_normalize_is_pure() {
        let text = "Från 7 412 kr";
        assert_eq!(normalize(text, "kr"), normalize(text, "kr"));
        assert_eq!(normalize(text, "kr"), Some(7412));
    }

    #[test]
    fn test_normalize_overflow() {
        assert_eq!(normalize("99999999999999999999999 kr", "kr"), None);
    }

    #[test]
    fn test_parse_price_reports_key_and_text() {
        let key = SearchKey::new(
            "GOT-BJS",
            NaiveDate::from_ymd_opt(2025, 12, 21).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 6).unwrap(),
        );
        assert_eq!(parse_price(&key, "7 412 kr", "kr").unwrap(), 7412);

        let err = parse_price(&key, "kr --", "kr").unwrap_err();
        assert_eq!(err.stage(), "normalize");
        match err {
            MonitorError::Parse { key, raw } => {
                assert_eq!(key, "GOT-BJS_20251221_20260106");
                assert_eq!(raw, "kr --");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_normalize_all_keeps_order() {
        let key = |day: u32| {
            SearchKey::new(
                "GOT-BJS",
                NaiveDate::from_ymd_opt(2025, 12, day).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 11).unwrap(),
            )
        };
        let raw = vec![
            RawObservation { key: key(21), raw_text: Some("9 100 kr".into()) },
            RawObservation { key: key(22), raw_text: None },
            RawObservation { key: key(23), raw_text: Some("sold out".into()) },
        ];
        let prices = normalize_all(&raw, "kr");
        assert_eq!(prices.len(), 3);
        assert_eq!(prices[0].amount, Some(9100));
        assert_eq!(prices[1].amount, None);
        assert_eq!(prices[2].amount, None);
        assert_eq!(prices[2].key, key(23));
    }
}
