//! Report ingestion: normalize, resolve the nearest stop, persist, then alert.
//!
//! The pipeline holds no mutable state of its own and can be shared between
//! concurrent request handlers behind an `Arc`.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::alert::{AlertDispatcher, ProximityAlert};
use crate::catalog::{RouteCatalog, RouteDefinition};
use crate::error::{IngestionError, StoreError, ValidationError};
use crate::normalize::ReportNormalizer;
use crate::proximity::resolve;
use crate::record::PositionRecord;
use crate::report::PositionReport;
use crate::store::HistoryStore;

pub const DEFAULT_ALERT_RADIUS_KM: f64 = 0.5;

pub struct IngestionPipeline {
    catalog: Arc<RouteCatalog>,
    normalizer: ReportNormalizer,
    store: Arc<dyn HistoryStore>,
    alerts: Arc<dyn AlertDispatcher>,
    default_alert_radius_km: f64,
}

impl IngestionPipeline {
    pub fn new(
        catalog: Arc<RouteCatalog>,
        store: Arc<dyn HistoryStore>,
        alerts: Arc<dyn AlertDispatcher>,
    ) -> Self {
        Self {
            normalizer: ReportNormalizer::new(catalog.clone()),
            catalog,
            store,
            alerts,
            default_alert_radius_km: DEFAULT_ALERT_RADIUS_KM,
        }
    }

    /// Radius applied to reports that don't carry `alert_radius_km`.
    pub fn with_default_alert_radius(mut self, radius_km: f64) -> Self {
        self.default_alert_radius_km = radius_km;
        self
    }

    pub fn catalog(&self) -> &RouteCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    pub fn alerts(&self) -> &Arc<dyn AlertDispatcher> {
        &self.alerts
    }

    /// Ingests one report and returns the stored record.
    ///
    /// Exactly one store write happens on success and none on failure. At most
    /// one alert is published; a failed publish is logged and does not fail
    /// the call.
    #[tracing::instrument(skip_all, fields(vehicle_id = tracing::field::Empty))]
    pub async fn ingest(&self, report: &PositionReport) -> Result<PositionRecord, IngestionError> {
        let normalized = self.normalizer.normalize(report).inspect_err(|e| {
            debug!(code = e.code(), error = %e, "Report rejected");
        })?;
        tracing::Span::current().record("vehicle_id", normalized.vehicle_id.as_str());

        let route = self
            .catalog
            .lookup(&normalized.vehicle_id)
            .ok_or_else(|| ValidationError::UnknownVehicle(normalized.vehicle_id.clone()))?;

        let nearest = resolve(normalized.latitude, normalized.longitude, route).inspect_err(|e| {
            tracing::error!(error = %e, "Route catalog invariant violated");
        })?;

        let radius_km = normalized.alert_radius_km.unwrap_or(self.default_alert_radius_km);
        let record = normalized.into_record(&route.route_label, nearest);

        self.store.put(&record).await.inspect_err(|e| {
            warn!(timestamp = record.timestamp, error = %e, "History write failed");
        })?;
        info!(
            timestamp = record.timestamp,
            next_stop = %record.next_stop_name,
            distance_km = record.distance_to_stop_km,
            "Position stored"
        );

        if record.distance_to_stop_km <= radius_km {
            self.notify(&record).await;
        }

        Ok(record)
    }

    async fn notify(&self, record: &PositionRecord) {
        let alert = ProximityAlert::for_record(record);
        match self.alerts.publish(&alert.subject, &alert.message).await {
            Ok(()) => info!(next_stop = %record.next_stop_name, "Proximity alert published"),
            Err(e) => warn!(error = %e, "Proximity alert dispatch failed"),
        }
    }

    /// Latest records for a catalog vehicle, newest first.
    pub async fn recent_history(
        &self,
        vehicle_id: &str,
        limit: usize,
    ) -> Result<(&RouteDefinition, Vec<PositionRecord>), IngestionError> {
        let route = self
            .catalog
            .lookup(vehicle_id)
            .ok_or_else(|| ValidationError::UnknownVehicle(vehicle_id.trim().to_uppercase()))?;
        let records = self.store.query_recent(&route.vehicle_id, limit).await?;
        Ok((route, records))
    }

    /// Writes a fully formed record without stop resolution or alerting.
    pub async fn put_raw(&self, record: &PositionRecord) -> Result<(), StoreError> {
        self.store.put(record).await
    }
}
