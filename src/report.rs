//! Inbound position report as received at the ingest boundary.
//!
//! Fields are deliberately lenient: numbers may arrive as JSON numbers or as
//! numeric strings, and unexpected shapes are kept so that the normalizer can
//! report which field was wrong instead of failing the whole body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON scalar that has not been validated yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Other(Value),
}

impl Scalar {
    /// Interprets the value as a finite float.
    pub fn as_finite_f64(&self) -> Option<f64> {
        let v = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            Self::Other(_) => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Renders the value as text, without quotes for strings.
    pub fn to_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
            Self::Other(v) => v.to_string(),
        }
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// The shapes a report timestamp can take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampInput {
    /// Epoch seconds, possibly fractional.
    Seconds(f64),
    /// ISO-8601 / RFC 3339 text, or epoch seconds as digits.
    Text(String),
    /// An in-process datetime (never produced by JSON decoding).
    DateTime(DateTime<Utc>),
    Other(Value),
}

impl From<DateTime<Utc>> for TimestampInput {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

/// Raw report: `{bus_id, lat, lon, speed_kmph?, status?, timestamp?, alert_radius_km?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus_id: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lon: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_kmph: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TimestampInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_radius_km: Option<Scalar>,
}

impl PositionReport {
    /// A report with only the required fields set.
    pub fn new(bus_id: &str, lat: f64, lon: f64) -> Self {
        Self {
            bus_id: Some(bus_id.into()),
            lat: Some(lat.into()),
            lon: Some(lon.into()),
            ..Default::default()
        }
    }

    pub fn with_speed(mut self, speed_kmph: f64) -> Self {
        self.speed_kmph = Some(speed_kmph.into());
        self
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<TimestampInput>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_alert_radius(mut self, radius_km: f64) -> Self {
        self.alert_radius_km = Some(radius_km.into());
        self
    }
}

impl From<i64> for TimestampInput {
    fn from(v: i64) -> Self {
        Self::Seconds(v as f64)
    }
}

impl From<&str> for TimestampInput {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}
