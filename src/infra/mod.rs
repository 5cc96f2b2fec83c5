//! AWS-backed collaborators.
//!
//! [`DynamoHistoryStore`] implements [`HistoryStore`](routewise::store::HistoryStore)
//! on a DynamoDB table. [`SnsDispatcher`] implements
//! [`AlertDispatcher`](routewise::alert::AlertDispatcher) on an SNS topic.

mod dynamodb;
mod sns;

pub use dynamodb::DynamoHistoryStore;
pub use sns::SnsDispatcher;

use aws_sdk_dynamodb::config::Region;
use routewise::config::Settings;

/// Loads the ambient AWS configuration (env vars, profile, instance role)
/// pinned to the configured region.
pub async fn load_aws_config(settings: &Settings) -> aws_config::SdkConfig {
    aws_config::from_env()
        .region(Region::new(settings.aws_region.clone()))
        .load()
        .await
}
