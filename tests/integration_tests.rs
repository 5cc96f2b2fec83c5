use async_trait::async_trait;
use pretty_assertions::assert_eq;
use routewise::alert::AlertDispatcher;
use routewise::catalog::{RouteCatalog, RouteDefinition, Stop};
use routewise::error::{DispatchError, IngestionError, ResolveError, StoreError, ValidationError};
use routewise::geo::distance_km;
use routewise::pipeline::IngestionPipeline;
use routewise::record::PositionRecord;
use routewise::report::PositionReport;
use routewise::store::{HistoryStore, MemoryHistoryStore};
use std::sync::{Arc, Mutex};

/// Wraps a memory store, counting writes and optionally failing them.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryHistoryStore,
    puts: Mutex<Vec<PositionRecord>>,
    fail: bool,
}

impl RecordingStore {
    fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    fn put_count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }
}

#[async_trait]
impl HistoryStore for RecordingStore {
    async fn put(&self, record: &PositionRecord) -> Result<(), StoreError> {
        self.puts.lock().unwrap().push(record.clone());
        if self.fail {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.put(record).await
    }

    async fn query_recent(&self, vehicle_id: &str, limit: usize) -> Result<Vec<PositionRecord>, StoreError> {
        self.inner.query_recent(vehicle_id, limit).await
    }
}

#[derive(Default)]
struct RecordingDispatcher {
    published: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingDispatcher {
    fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertDispatcher for RecordingDispatcher {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), DispatchError> {
        self.published.lock().unwrap().push((subject.to_string(), message.to_string()));
        if self.fail {
            return Err(DispatchError::Failed("topic does not exist".to_string()));
        }
        Ok(())
    }

    async fn subscribe(&self, _endpoint: &str) -> Result<(), DispatchError> {
        Ok(())
    }
}

struct Harness {
    pipeline: IngestionPipeline,
    store: Arc<RecordingStore>,
    alerts: Arc<RecordingDispatcher>,
}

fn harness_with(catalog: RouteCatalog, store: RecordingStore, alerts: RecordingDispatcher) -> Harness {
    let store = Arc::new(store);
    let alerts = Arc::new(alerts);
    let pipeline = IngestionPipeline::new(Arc::new(catalog), store.clone(), alerts.clone());
    Harness { pipeline, store, alerts }
}

fn harness() -> Harness {
    harness_with(RouteCatalog::builtin().unwrap(), RecordingStore::default(), RecordingDispatcher::default())
}

#[tokio::test]
async fn test_ameerpet_scenario() {
    let h = harness();
    let report: PositionReport = serde_json::from_value(serde_json::json!({
        "bus_id": "10a", "lat": 17.4376, "lon": 78.4483, "alert_radius_km": 0.5
    }))
    .unwrap();

    let record = h.pipeline.ingest(&report).await.unwrap();

    assert_eq!(record.vehicle_id, "10A");
    assert_eq!(record.next_stop_name, "Ameerpet");
    assert!((record.distance_to_stop_km - 0.011).abs() < 0.001);
    assert_eq!(record.route_label, "Secunderabad → Mehdipatnam");
    assert_eq!(record.status, "ACTIVE");
    assert!((10.0..35.0).contains(&record.speed_kmph));
    assert!(record.timestamp > 0);

    assert_eq!(h.store.put_count(), 1);
    let published = h.alerts.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "Bus 10A nearing Ameerpet");
    assert!(published[0].1.contains("Distance: 0.01 km"));
}

#[tokio::test]
async fn test_unknown_vehicle_never_writes() {
    let h = harness();
    let err = h.pipeline.ingest(&PositionReport::new("99Z", 17.4, 78.4)).await.unwrap_err();

    assert_eq!(err, IngestionError::Validation(ValidationError::UnknownVehicle("99Z".to_string())));
    assert_eq!(h.store.put_count(), 0);
    assert!(h.alerts.published().is_empty());
}

#[tokio::test]
async fn test_malformed_input_never_writes() {
    let h = harness();
    let mut report = PositionReport::new("10A", 17.4, 78.4);
    report.lat = Some("seventeen".into());

    let err = h.pipeline.ingest(&report).await.unwrap_err();
    assert_eq!(err.code(), "malformed_coordinate");

    let report = PositionReport::new("10A", 17.4, 78.4).with_timestamp("last tuesday");
    let err = h.pipeline.ingest(&report).await.unwrap_err();
    assert_eq!(err.code(), "malformed_timestamp");

    assert_eq!(h.store.put_count(), 0);
}

#[tokio::test]
async fn test_iso_timestamp_is_exact() {
    let h = harness();
    let report = PositionReport::new("10A", 17.4376, 78.4483).with_timestamp("2025-01-01T00:00:00Z");

    let record = h.pipeline.ingest(&report).await.unwrap();
    assert_eq!(record.timestamp, 1735689600);

    let published = h.alerts.published();
    assert!(published[0].1.contains("Time: 2025-01-01 00:00:00 UTC"));
}

#[tokio::test]
async fn test_alert_threshold_is_inclusive() {
    let h = harness();
    // About 1.4 km north-west of Ameerpet; every other stop is further away.
    let (lat, lon) = (17.4475, 78.4400);
    let exact = distance_km(lat, lon, 17.4375, 78.4483);

    let beyond = PositionReport::new("10A", lat, lon).with_timestamp(1i64).with_alert_radius(exact - 1e-9);
    let record = h.pipeline.ingest(&beyond).await.unwrap();
    assert_eq!(record.next_stop_name, "Ameerpet");
    assert!(h.alerts.published().is_empty());

    let at_edge = PositionReport::new("10A", lat, lon).with_timestamp(2i64).with_alert_radius(exact);
    h.pipeline.ingest(&at_edge).await.unwrap();
    assert_eq!(h.alerts.published().len(), 1);

    assert_eq!(h.store.put_count(), 2);
}

#[tokio::test]
async fn test_default_radius_applies_when_absent() {
    let h = harness();
    let far = PositionReport::new("65G", 17.3500, 78.3900);
    let record = h.pipeline.ingest(&far).await.unwrap();
    assert!(record.distance_to_stop_km > 0.5);
    assert!(h.alerts.published().is_empty());

    let wide = harness_with(
        RouteCatalog::builtin().unwrap(),
        RecordingStore::default(),
        RecordingDispatcher::default(),
    );
    let pipeline = wide.pipeline.with_default_alert_radius(50.0);
    pipeline.ingest(&far).await.unwrap();
    assert_eq!(wide.alerts.published().len(), 1);
}

#[tokio::test]
async fn test_reingest_overwrites_same_key() {
    let h = harness();
    let first = PositionReport::new("100M", 17.4432, 78.4841).with_timestamp(1_700_000_000i64).with_speed(12.0);
    let second = PositionReport::new("100m", 17.4432, 78.4841).with_timestamp(1_700_000_000i64).with_speed(30.0);

    h.pipeline.ingest(&first).await.unwrap();
    h.pipeline.ingest(&second).await.unwrap();

    let history = h.store.query_recent("100M", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].speed_kmph, 30.0);
    assert_eq!(h.store.put_count(), 2);
}

#[tokio::test]
async fn test_valid_reports_resolve_to_route_stops() {
    let h = harness();
    let catalog = RouteCatalog::builtin().unwrap();

    let mut ts = 1_000i64;
    for route in catalog.iter() {
        for stop in &route.stops {
            for (dlat, dlon) in [(0.0, 0.0), (0.02, -0.01), (-0.03, 0.04)] {
                ts += 1;
                let bus_id = route.vehicle_id.to_lowercase();
                let report =
                    PositionReport::new(&bus_id, stop.latitude + dlat, stop.longitude + dlon)
                        .with_timestamp(ts);
                let record = h.pipeline.ingest(&report).await.unwrap();

                assert!(record.distance_to_stop_km >= 0.0);
                assert!(route.stop_names().any(|n| n == record.next_stop_name));
                let best = route
                    .stops
                    .iter()
                    .map(|s| distance_km(record.latitude, record.longitude, s.latitude, s.longitude))
                    .fold(f64::INFINITY, f64::min);
                assert_eq!(record.distance_to_stop_km, best);
            }
        }
    }
    assert_eq!(h.store.put_count(), 45);
}

#[tokio::test]
async fn test_store_failure_is_reported_and_skips_alert() {
    let h = harness_with(
        RouteCatalog::builtin().unwrap(),
        RecordingStore::failing(),
        RecordingDispatcher::default(),
    );
    let err = h.pipeline.ingest(&PositionReport::new("10A", 17.4375, 78.4483)).await.unwrap_err();

    assert_eq!(err, IngestionError::Store(StoreError::Unavailable("connection reset".to_string())));
    assert!(h.alerts.published().is_empty());
}

#[tokio::test]
async fn test_dispatch_failure_does_not_fail_ingest() {
    let h = harness_with(
        RouteCatalog::builtin().unwrap(),
        RecordingStore::default(),
        RecordingDispatcher::failing(),
    );
    let record = h.pipeline.ingest(&PositionReport::new("10A", 17.4375, 78.4483)).await.unwrap();

    assert_eq!(record.distance_to_stop_km, 0.0);
    assert_eq!(h.alerts.published().len(), 1);
    assert_eq!(h.store.query_recent("10A", 1).await.unwrap(), vec![record]);
}

#[tokio::test]
async fn test_empty_route_is_a_resolve_error() {
    let catalog = RouteCatalog::from_routes([RouteDefinition {
        vehicle_id: "x1".to_string(),
        route_label: "Nowhere".to_string(),
        stops: Vec::<Stop>::new(),
        service_frequency_label: String::new(),
        vehicle_class: String::new(),
    }]);
    let h = harness_with(catalog, RecordingStore::default(), RecordingDispatcher::default());

    let err = h.pipeline.ingest(&PositionReport::new("X1", 0.0, 0.0)).await.unwrap_err();
    assert_eq!(err, IngestionError::Resolve(ResolveError::EmptyRoute("X1".to_string())));
    assert_eq!(h.store.put_count(), 0);
}

#[tokio::test]
async fn test_concurrent_ingest_for_same_vehicle() {
    let h = harness();
    let pipeline = Arc::new(h.pipeline);

    let mut tasks = vec![];
    for ts in 0..20i64 {
        let pipeline = pipeline.clone();
        tasks.push(tokio::spawn(async move {
            pipeline
                .ingest(&PositionReport::new("65G", 17.4401, 78.3489).with_timestamp(ts))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let history = h.store.query_recent("65G", 100).await.unwrap();
    let stamps: Vec<_> = history.iter().map(|r| r.timestamp).collect();
    assert_eq!(stamps, (0..20).rev().collect::<Vec<_>>());
    assert_eq!(h.alerts.published().len(), 20);
}
