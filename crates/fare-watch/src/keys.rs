// Copyright 2026 Fare Watch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Search keys: the fixed set of (departure, return) itineraries a monitor polls.

use crate::error::{MonitorError, MonitorResult};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// One itinerary query. Immutable once generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchKey {
    /// Route code, e.g. "GOT-BJS".
    pub destination: String,
    pub depart_date: NaiveDate,
    pub return_date: NaiveDate,
}

impl SearchKey {
    pub fn new(destination: &str, depart_date: NaiveDate, return_date: NaiveDate) -> Self {
        Self {
            destination: destination.to_string(),
            depart_date,
            return_date,
        }
    }

    /// Trip length in days, counting both the departure and the return day.
    pub fn trip_length(&self) -> i64 {
        (self.return_date - self.depart_date).num_days() + 1
    }
}

impl fmt::Display for SearchKey {
    /// `{destination}_{YYYYMMDD}_{YYYYMMDD}`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.destination,
            self.depart_date.format("%Y%m%d"),
            self.return_date.format("%Y%m%d")
        )
    }
}

/// Search URL template with `{destination}`, `{depart}` and `{return}` placeholders.
///
/// Dates are substituted in ISO `YYYY-MM-DD` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTemplate(String);

impl QueryTemplate {
    pub fn new(template: impl Into<String>) -> MonitorResult<Self> {
        let template = template.into();
        for placeholder in ["{depart}", "{return}"] {
            if !template.contains(placeholder) {
                return Err(MonitorError::Configuration(format!(
                    "query template is missing the {placeholder} placeholder"
                )));
            }
        }
        Ok(Self(template))
    }

    /// Render the query URL for one key.
    pub fn render(&self, key: &SearchKey) -> MonitorResult<String> {
        let rendered = self
            .0
            .replace("{destination}", &key.destination)
            .replace("{depart}", &key.depart_date.format("%Y-%m-%d").to_string())
            .replace("{return}", &key.return_date.format("%Y-%m-%d").to_string());

        url::Url::parse(&rendered).map_err(|e| {
            MonitorError::Configuration(format!("query template renders an invalid URL: {e}"))
        })?;
        Ok(rendered)
    }
}

/// Ordered mapping from search key to its query URL.
#[derive(Debug, Clone, Default)]
pub struct SearchKeySet {
    entries: Vec<(SearchKey, String)>,
}

impl SearchKeySet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SearchKey, &str)> {
        self.entries.iter().map(|(k, q)| (k, q.as_str()))
    }

    pub fn nth(&self, index: usize) -> Option<(&SearchKey, &str)> {
        self.entries.get(index).map(|(k, q)| (k, q.as_str()))
    }
}

/// Enumerate every itinerary in the window that is at least `min_trip_length` days long.
///
/// Trip lengths are swept from the full window down to `min_trip_length`; for each
/// length a window slides one day at a time across `[window_start, window_end]`.
/// Longer trips therefore come first. Pairs are de-duplicated on `(depart, return)`.
pub fn generate(
    destination: &str,
    window_start: NaiveDate,
    window_end: NaiveDate,
    min_trip_length: u32,
) -> MonitorResult<Vec<SearchKey>> {
    if window_start > window_end {
        return Err(MonitorError::Configuration(format!(
            "date window start {window_start} is after end {window_end}"
        )));
    }
    if min_trip_length == 0 {
        return Err(MonitorError::Configuration(
            "minimum trip length must be at least 1 day".to_string(),
        ));
    }

    let window_length = (window_end - window_start).num_days() + 1;
    let min_trip_length = i64::from(min_trip_length);
    if min_trip_length > window_length {
        return Err(MonitorError::Configuration(format!(
            "minimum trip length {min_trip_length} exceeds the {window_length}-day window"
        )));
    }

    let mut seen: HashSet<(NaiveDate, NaiveDate)> = HashSet::new();
    let mut keys = Vec::new();

    for length in (min_trip_length..=window_length).rev() {
        let mut depart = window_start;
        let mut ret = window_start + Duration::days(length - 1);
        while ret <= window_end {
            if seen.insert((depart, ret)) {
                keys.push(SearchKey::new(destination, depart, ret));
            }
            depart += Duration::days(1);
            ret += Duration::days(1);
        }
    }

    Ok(keys)
}

/// Generate the keys and attach each one's query URL.
pub fn build_key_set(
    destination: &str,
    window_start: NaiveDate,
    window_end: NaiveDate,
    min_trip_length: u32,
    template: &QueryTemplate,
) -> MonitorResult<SearchKeySet> {
    let entries = generate(destination, window_start, window_end, min_trip_length)?
        .into_iter()
        .map(|key| {
            let query = template.render(&key)?;
            Ok((key, query))
        })
        .collect::<MonitorResult<Vec<_>>>()?;

    Ok(SearchKeySet { entries })
}
