//! Validation and canonicalization of inbound reports.
//!
//! Fields are checked in a fixed order so that a report with several bad
//! fields always yields the same error: bus id, latitude, longitude,
//! timestamp, speed, alert radius.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rand::Rng;
use std::sync::Arc;

use crate::catalog::RouteCatalog;
use crate::error::ValidationError;
use crate::proximity::NearestStop;
use crate::record::PositionRecord;
use crate::report::{PositionReport, Scalar, TimestampInput};

pub const DEFAULT_STATUS: &str = "ACTIVE";

/// Bounds of the placeholder speed used when a report carries none. The value
/// is filler for missing telemetry, not a measurement.
pub const FILLER_SPEED_KMPH: std::ops::Range<f64> = 10.0..35.0;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A validated report, not yet matched to a stop.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReport {
    pub vehicle_id: String,
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmph: f64,
    pub status: String,
    /// `None` when the report did not ask for a specific radius.
    pub alert_radius_km: Option<f64>,
}

impl NormalizedReport {
    /// Completes the record with route and stop details.
    pub fn into_record(self, route_label: &str, nearest: NearestStop) -> PositionRecord {
        PositionRecord {
            vehicle_id: self.vehicle_id,
            timestamp: self.timestamp,
            latitude: self.latitude,
            longitude: self.longitude,
            speed_kmph: self.speed_kmph,
            status: self.status,
            route_label: route_label.to_string(),
            next_stop_name: nearest.name,
            distance_to_stop_km: nearest.distance_km,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportNormalizer {
    catalog: Arc<RouteCatalog>,
}

impl ReportNormalizer {
    pub fn new(catalog: Arc<RouteCatalog>) -> Self {
        Self { catalog }
    }

    pub fn normalize(&self, report: &PositionReport) -> Result<NormalizedReport, ValidationError> {
        self.normalize_at(report, Utc::now())
    }

    /// Like [`normalize`](Self::normalize) with an explicit "now" for reports
    /// that carry no timestamp.
    pub fn normalize_at(
        &self,
        report: &PositionReport,
        now: DateTime<Utc>,
    ) -> Result<NormalizedReport, ValidationError> {
        let vehicle_id = report
            .bus_id
            .as_ref()
            .map(|v| v.to_text().trim().to_uppercase())
            .filter(|v| !v.is_empty())
            .ok_or(ValidationError::MissingVehicleId)?;
        if self.catalog.lookup(&vehicle_id).is_none() {
            return Err(ValidationError::UnknownVehicle(vehicle_id));
        }

        let latitude = coordinate("lat", report.lat.as_ref())?;
        let longitude = coordinate("lon", report.lon.as_ref())?;
        let timestamp = parse_timestamp(report.timestamp.as_ref(), now)?;

        let speed_kmph = match &report.speed_kmph {
            Some(v) => number("speed_kmph", v)?,
            None => rand::rng().random_range(FILLER_SPEED_KMPH),
        };
        let alert_radius_km =
            report.alert_radius_km.as_ref().map(|v| number("alert_radius_km", v)).transpose()?;

        let status = report
            .status
            .as_ref()
            .map(|s| s.to_text().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_STATUS.to_string());

        Ok(NormalizedReport {
            vehicle_id,
            timestamp,
            latitude,
            longitude,
            speed_kmph,
            status,
            alert_radius_km,
        })
    }
}

fn coordinate(field: &'static str, value: Option<&Scalar>) -> Result<f64, ValidationError> {
    let value = value.ok_or(ValidationError::MalformedCoordinate {
        field,
        value: "missing".to_string(),
    })?;
    value
        .as_finite_f64()
        .ok_or_else(|| ValidationError::MalformedCoordinate { field, value: value.to_text() })
}

fn number(field: &'static str, value: &Scalar) -> Result<f64, ValidationError> {
    value
        .as_finite_f64()
        .ok_or_else(|| ValidationError::MalformedNumber { field, value: value.to_text() })
}

/// Converts any accepted timestamp shape to non-negative epoch seconds.
///
/// Absent or blank input means `now`. Numbers are truncated toward zero.
/// Text is RFC 3339, a naive ISO-8601 datetime or date (taken as UTC), or
/// plain epoch digits.
pub fn parse_timestamp(
    input: Option<&TimestampInput>,
    now: DateTime<Utc>,
) -> Result<i64, ValidationError> {
    let malformed = |raw: String| ValidationError::MalformedTimestamp(raw);

    let seconds = match input {
        None => now.timestamp(),
        Some(TimestampInput::Seconds(s)) => {
            if !s.is_finite() || s.trunc() < 0.0 || s.trunc() >= i64::MAX as f64 {
                return Err(malformed(s.to_string()));
            }
            s.trunc() as i64
        }
        Some(TimestampInput::DateTime(dt)) => dt.timestamp(),
        Some(TimestampInput::Text(raw)) => {
            let text = raw.trim();
            if text.is_empty() {
                now.timestamp()
            } else {
                parse_text_timestamp(text).ok_or_else(|| malformed(raw.clone()))?
            }
        }
        Some(TimestampInput::Other(v)) => return Err(malformed(v.to_string())),
    };

    if seconds < 0 {
        return Err(malformed(seconds.to_string()));
    }
    Ok(seconds)
}

fn parse_text_timestamp(text: &str) -> Option<i64> {
    if text.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse().ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.timestamp());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}
