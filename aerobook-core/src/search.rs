use aerobook_catalog::Flight;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::{eq_lowercase, CoreError, CoreResult};

/// Raw `?from&to&date` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct FlightSearchQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub date: Option<String>,
}

/// Validated search: case-insensitive exact city match, optional UTC departure day.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightSearch {
    pub from: String,
    pub to: String,
    pub date: Option<NaiveDate>,
}

impl TryFrom<FlightSearchQuery> for FlightSearch {
    type Error = CoreError;

    fn try_from(query: FlightSearchQuery) -> CoreResult<Self> {
        let required = |value: Option<String>, name: &str| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| CoreError::Validation(format!("'{}' is required", name)))
        };
        let from = required(query.from, "from")?;
        let to = required(query.to, "to")?;
        let date = match query.date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| CoreError::Validation(format!("invalid date '{}', expected YYYY-MM-DD", raw)))?,
            ),
        };
        Ok(Self { from, to, date })
    }
}

impl FlightSearch {
    /// Inclusive `[00:00:00.000, 23:59:59.999]` UTC bounds of the requested day.
    pub fn day_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.date.map(|day| {
            let start = day.and_time(NaiveTime::MIN).and_utc();
            (start, start + Duration::days(1) - Duration::milliseconds(1))
        })
    }

    pub fn matches(&self, flight: &Flight) -> bool {
        if !flight.is_approved() {
            return false;
        }
        if !eq_lowercase(&flight.departure.city, &self.from) || !eq_lowercase(&flight.arrival.city, &self.to) {
            return false;
        }
        match self.day_bounds() {
            Some((start, end)) => flight.departure.date >= start && flight.departure.date <= end,
            None => true,
        }
    }
}
