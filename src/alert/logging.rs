use async_trait::async_trait;
use tracing::info;

use super::AlertDispatcher;
use crate::error::DispatchError;

/// Writes alerts to the log. Used when no notification topic is configured.
#[derive(Debug, Default, Clone)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    async fn publish(&self, subject: &str, message: &str) -> Result<(), DispatchError> {
        info!(subject, message, "Alert (no topic configured)");
        Ok(())
    }

    async fn subscribe(&self, endpoint: &str) -> Result<(), DispatchError> {
        info!(endpoint, "Subscription ignored (no topic configured)");
        Ok(())
    }
}
