use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted position. `(vehicle_id, timestamp)` is the composite key; a
/// second write with the same key replaces the first.
///
/// Field names on the wire match the history table's attribute names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    #[serde(rename = "BusID")]
    pub vehicle_id: String,
    #[serde(rename = "TimeStamp")]
    pub timestamp: i64,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "SpeedKmph")]
    pub speed_kmph: f64,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Route")]
    pub route_label: String,
    #[serde(rename = "NextStop")]
    pub next_stop_name: String,
    #[serde(rename = "DistanceToStopKm")]
    pub distance_to_stop_km: f64,
}

impl PositionRecord {
    pub fn formatted_time(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

/// Renders epoch seconds as `YYYY-MM-DD HH:MM:SS UTC`.
pub fn format_timestamp(epoch_seconds: i64) -> String {
    match DateTime::<Utc>::from_timestamp(epoch_seconds, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => epoch_seconds.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1735689600), "2025-01-01 00:00:00 UTC");
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    }

    #[test]
    fn test_serializes_with_table_attribute_names() {
        let record = PositionRecord {
            vehicle_id: "10A".to_string(),
            timestamp: 1735689600,
            latitude: 17.4376,
            longitude: 78.4483,
            speed_kmph: 20.0,
            status: "ACTIVE".to_string(),
            route_label: "Secunderabad → Mehdipatnam".to_string(),
            next_stop_name: "Ameerpet".to_string(),
            distance_to_stop_km: 0.011,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["BusID"], json!("10A"));
        assert_eq!(value["TimeStamp"], json!(1735689600));
        assert_eq!(value["NextStop"], json!("Ameerpet"));
        assert_eq!(record.formatted_time(), "2025-01-01 00:00:00 UTC");
    }
}
