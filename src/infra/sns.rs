use async_trait::async_trait;
use aws_sdk_sns::error::DisplayErrorContext;
use tracing::info;

use routewise::alert::AlertDispatcher;
use routewise::error::DispatchError;

/// SNS rejects subjects longer than this.
const MAX_SUBJECT_CHARS: usize = 100;

/// Publishes alerts to an SNS topic and subscribes e-mail endpoints to it.
pub struct SnsDispatcher {
    client: aws_sdk_sns::Client,
    topic_arn: String,
}

impl SnsDispatcher {
    pub fn new(config: &aws_config::SdkConfig, topic_arn: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_sns::Client::new(config),
            topic_arn: topic_arn.into(),
        }
    }
}

fn failed<E: std::error::Error>(operation: &str, err: E) -> DispatchError {
    DispatchError::Failed(format!("SNS {operation} failed: {}", DisplayErrorContext(err)))
}

fn clamp_subject(subject: &str) -> String {
    subject.chars().take(MAX_SUBJECT_CHARS).collect()
}

#[async_trait]
impl AlertDispatcher for SnsDispatcher {
    #[tracing::instrument(skip(self, message), fields(topic = %self.topic_arn))]
    async fn publish(&self, subject: &str, message: &str) -> Result<(), DispatchError> {
        let resp = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .subject(clamp_subject(subject))
            .message(message)
            .send()
            .await
            .map_err(|e| failed("Publish", e))?;

        info!(message_id = resp.message_id().unwrap_or_default(), "SNS publish succeeded");
        Ok(())
    }

    /// Subscribes an e-mail address; SNS sends it a confirmation request.
    #[tracing::instrument(skip(self), fields(topic = %self.topic_arn))]
    async fn subscribe(&self, endpoint: &str) -> Result<(), DispatchError> {
        self.client
            .subscribe()
            .topic_arn(&self.topic_arn)
            .protocol("email")
            .endpoint(endpoint)
            .send()
            .await
            .map_err(|e| failed("Subscribe", e))?;

        info!("SNS subscription requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_subject() {
        assert_eq!(clamp_subject("Bus 10A nearing Ameerpet"), "Bus 10A nearing Ameerpet");
        let long = "x".repeat(150);
        assert_eq!(clamp_subject(&long).len(), MAX_SUBJECT_CHARS);
    }
}
