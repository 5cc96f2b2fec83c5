//! Synthetic GPS traffic for demos and local testing.

use rand::Rng;

use crate::catalog::{RouteCatalog, RouteDefinition};
use crate::pipeline::DEFAULT_ALERT_RADIUS_KM;
use crate::record::PositionRecord;
use crate::report::PositionReport;

/// Maximum offset, in degrees, of a simulated fix from its stop.
pub const REPORT_JITTER_DEG: f64 = 0.005;
/// Maximum offset, in degrees, of a generated history record from its stop.
pub const HISTORY_JITTER_DEG: f64 = 0.01;
/// Records generated per vehicle by [`generate_history`].
pub const HISTORY_RECORDS_PER_VEHICLE: i64 = 5;
/// Spacing between generated history records.
pub const HISTORY_SPACING_SECS: i64 = 300;

/// A report placed near a random stop of `route`. The timestamp is left for
/// the pipeline to fill in.
///
/// Returns `None` for a route without stops.
pub fn simulated_report<R: Rng + ?Sized>(
    route: &RouteDefinition,
    rng: &mut R,
) -> Option<PositionReport> {
    if route.stops.is_empty() {
        return None;
    }
    let stop = &route.stops[rng.random_range(0..route.stops.len())];

    Some(
        PositionReport::new(
            &route.vehicle_id,
            stop.latitude + rng.random_range(-REPORT_JITTER_DEG..REPORT_JITTER_DEG),
            stop.longitude + rng.random_range(-REPORT_JITTER_DEG..REPORT_JITTER_DEG),
        )
        .with_speed(rng.random_range(10.0..35.0))
        .with_status("ACTIVE")
        .with_alert_radius(DEFAULT_ALERT_RADIUS_KM),
    )
}

/// Backfill records for every vehicle in `catalog`, spaced five minutes apart
/// ending at `now`. These are written directly to the store, so stop and
/// distance are synthetic rather than resolved.
pub fn generate_history<R: Rng + ?Sized>(
    catalog: &RouteCatalog,
    now: i64,
    rng: &mut R,
) -> Vec<PositionRecord> {
    let mut records = Vec::new();
    for route in catalog.iter().filter(|r| !r.stops.is_empty()) {
        for i in 0..HISTORY_RECORDS_PER_VEHICLE {
            let stop = &route.stops[rng.random_range(0..route.stops.len())];
            records.push(PositionRecord {
                vehicle_id: route.vehicle_id.clone(),
                timestamp: now - i * HISTORY_SPACING_SECS,
                latitude: stop.latitude + rng.random_range(-HISTORY_JITTER_DEG..HISTORY_JITTER_DEG),
                longitude: stop.longitude + rng.random_range(-HISTORY_JITTER_DEG..HISTORY_JITTER_DEG),
                speed_kmph: rng.random_range(15.0..45.0),
                status: "ACTIVE".to_string(),
                route_label: route.route_label.clone(),
                next_stop_name: stop.name.clone(),
                distance_to_stop_km: rng.random_range(0.1..2.0),
            });
        }
    }
    records
}
