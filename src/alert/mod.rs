//! Proximity notifications.
//!
//! [`AlertDispatcher`] is the outbound notification channel. Delivery is
//! best-effort: the pipeline logs a failed publish and carries on.

mod logging;

pub use logging::LogDispatcher;

use crate::error::DispatchError;
use crate::record::PositionRecord;

#[async_trait::async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), DispatchError>;

    /// Registers an address that should receive future alerts.
    async fn subscribe(&self, endpoint: &str) -> Result<(), DispatchError>;
}

/// Notification raised when a bus is within the alert radius of its next stop.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityAlert {
    pub subject: String,
    pub message: String,
}

impl ProximityAlert {
    pub fn for_record(record: &PositionRecord) -> Self {
        let subject = format!("Bus {} nearing {}", record.vehicle_id, record.next_stop_name);
        let message = format!(
            "RouteWise Alert\nBus: {}\nNext Stop: {}\nDistance: {:.2} km\nTime: {}\n",
            record.vehicle_id,
            record.next_stop_name,
            record.distance_to_stop_km,
            record.formatted_time(),
        );
        Self { subject, message }
    }
}
