use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;
use tracing::{debug, warn};

use routewise::error::StoreError;
use routewise::record::PositionRecord;
use routewise::store::HistoryStore;

const ATTR_BUS_ID: &str = "BusID";
const ATTR_TIMESTAMP: &str = "TimeStamp";
const ATTR_LATITUDE: &str = "Latitude";
const ATTR_LONGITUDE: &str = "Longitude";
const ATTR_SPEED: &str = "SpeedKmph";
const ATTR_STATUS: &str = "Status";
const ATTR_ROUTE: &str = "Route";
const ATTR_NEXT_STOP: &str = "NextStop";
const ATTR_DISTANCE: &str = "DistanceToStopKm";

type Item = HashMap<String, AttributeValue>;

/// Position history in a DynamoDB table with partition key `BusID` (S) and
/// sort key `TimeStamp` (N).
///
/// `PutItem` replaces any item with the same key, which gives the upsert
/// semantics the pipeline relies on.
pub struct DynamoHistoryStore {
    client: aws_sdk_dynamodb::Client,
    table: String,
}

impl DynamoHistoryStore {
    pub fn new(config: &aws_config::SdkConfig, table: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_dynamodb::Client::new(config),
            table: table.into(),
        }
    }
}

fn unavailable<E: std::error::Error>(operation: &str, err: E) -> StoreError {
    StoreError::Unavailable(format!("DynamoDB {operation} failed: {}", DisplayErrorContext(err)))
}

fn to_item(record: &PositionRecord) -> Item {
    HashMap::from([
        (ATTR_BUS_ID.to_string(), AttributeValue::S(record.vehicle_id.clone())),
        (ATTR_TIMESTAMP.to_string(), AttributeValue::N(record.timestamp.to_string())),
        (ATTR_LATITUDE.to_string(), AttributeValue::N(record.latitude.to_string())),
        (ATTR_LONGITUDE.to_string(), AttributeValue::N(record.longitude.to_string())),
        (ATTR_SPEED.to_string(), AttributeValue::N(record.speed_kmph.to_string())),
        (ATTR_STATUS.to_string(), AttributeValue::S(record.status.clone())),
        (ATTR_ROUTE.to_string(), AttributeValue::S(record.route_label.clone())),
        (ATTR_NEXT_STOP.to_string(), AttributeValue::S(record.next_stop_name.clone())),
        (ATTR_DISTANCE.to_string(), AttributeValue::N(record.distance_to_stop_km.to_string())),
    ])
}

fn string_attr(item: &Item, name: &str) -> Result<String> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| anyhow!("missing string attribute '{name}'"))
}

fn number_attr<T: std::str::FromStr>(item: &Item, name: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = item
        .get(name)
        .and_then(|v| v.as_n().ok())
        .ok_or_else(|| anyhow!("missing number attribute '{name}'"))?;
    raw.parse().with_context(|| format!("attribute '{name}' has invalid value '{raw}'"))
}

fn from_item(item: &Item) -> Result<PositionRecord> {
    Ok(PositionRecord {
        vehicle_id: string_attr(item, ATTR_BUS_ID)?,
        timestamp: number_attr(item, ATTR_TIMESTAMP)?,
        latitude: number_attr(item, ATTR_LATITUDE)?,
        longitude: number_attr(item, ATTR_LONGITUDE)?,
        speed_kmph: number_attr(item, ATTR_SPEED)?,
        status: string_attr(item, ATTR_STATUS)?,
        route_label: string_attr(item, ATTR_ROUTE)?,
        next_stop_name: string_attr(item, ATTR_NEXT_STOP)?,
        distance_to_stop_km: number_attr(item, ATTR_DISTANCE)?,
    })
}

#[async_trait]
impl HistoryStore for DynamoHistoryStore {
    #[tracing::instrument(
        skip_all,
        fields(table = %self.table, vehicle_id = %record.vehicle_id, timestamp = record.timestamp)
    )]
    async fn put(&self, record: &PositionRecord) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(to_item(record)))
            .send()
            .await
            .map_err(|e| unavailable("PutItem", e))?;

        debug!("DynamoDB put_item succeeded");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(table = %self.table))]
    async fn query_recent(
        &self,
        vehicle_id: &str,
        limit: usize,
    ) -> Result<Vec<PositionRecord>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let resp = self
            .client
            .query()
            .table_name(&self.table)
            .key_condition_expression("#bus = :bus")
            .expression_attribute_names("#bus", ATTR_BUS_ID)
            .expression_attribute_values(":bus", AttributeValue::S(vehicle_id.to_string()))
            .scan_index_forward(false)
            .limit(i32::try_from(limit).unwrap_or(i32::MAX))
            .send()
            .await
            .map_err(|e| unavailable("Query", e))?;

        let records = resp
            .items()
            .iter()
            .filter_map(|item| match from_item(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable history item");
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!(count = records.len(), "DynamoDB query returned");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PositionRecord {
        PositionRecord {
            vehicle_id: "10A".to_string(),
            timestamp: 1735689600,
            latitude: 17.4376,
            longitude: 78.4483,
            speed_kmph: 22.75,
            status: "ACTIVE".to_string(),
            route_label: "Secunderabad → Mehdipatnam".to_string(),
            next_stop_name: "Ameerpet".to_string(),
            distance_to_stop_km: 0.011119492664455873,
        }
    }

    #[test]
    fn test_item_uses_table_attribute_names() {
        let item = to_item(&record());
        assert_eq!(item.len(), 9);
        assert_eq!(item[ATTR_BUS_ID], AttributeValue::S("10A".to_string()));
        assert_eq!(item[ATTR_TIMESTAMP], AttributeValue::N("1735689600".to_string()));
        assert_eq!(item[ATTR_NEXT_STOP], AttributeValue::S("Ameerpet".to_string()));
    }

    #[test]
    fn test_item_decodes_back() {
        assert_eq!(from_item(&to_item(&record())).unwrap(), record());
    }

    #[test]
    fn test_item_missing_attribute() {
        let mut item = to_item(&record());
        item.remove(ATTR_NEXT_STOP);
        let err = from_item(&item).unwrap_err();
        assert!(err.to_string().contains("NextStop"));
    }

    #[test]
    fn test_item_with_wrong_type() {
        let mut item = to_item(&record());
        item.insert(ATTR_TIMESTAMP.to_string(), AttributeValue::S("yesterday".to_string()));
        assert!(from_item(&item).is_err());
    }
}
