//! Outbound HTTP: pushes reports to a remote ingest endpoint.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use tracing::debug;

use crate::api::TrackResponse;
use crate::report::PositionReport;

pub const TRACK_PATH: &str = "/api/v1/track";

/// POSTs `report` to `{base_url}/api/v1/track` and decodes the envelope.
///
/// Rejections (`ok: false`) come back as `Ok`; only transport and decoding
/// failures are errors.
pub async fn post_report<C: HttpClient>(
    client: &C,
    base_url: &str,
    report: &PositionReport,
) -> Result<TrackResponse> {
    let url = format!("{}{TRACK_PATH}", base_url.trim_end_matches('/'));
    let mut req = reqwest::Request::new(
        reqwest::Method::POST,
        url.parse::<reqwest::Url>().with_context(|| format!("invalid ingest URL '{url}'"))?,
    );
    req.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    *req.body_mut() = Some(serde_json::to_vec(report)?.into());

    let resp = client
        .execute(req)
        .await
        .with_context(|| format!("POST {url} failed"))?;
    let status = resp.status();
    let body = resp.bytes().await?;
    debug!(%status, bytes = body.len(), "Ingest endpoint replied");

    serde_json::from_slice(&body)
        .with_context(|| format!("unexpected reply from {url} (status {status})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers every request with a canned body and remembers what was sent.
    struct CannedClient {
        status: u16,
        body: &'static str,
        seen: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl CannedClient {
        fn new(status: u16, body: &'static str) -> Self {
            Self { status, body, seen: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl HttpClient for CannedClient {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let sent = req.body().and_then(|b| b.as_bytes()).map(<[u8]>::to_vec).unwrap_or_default();
            self.seen.lock().unwrap().push((req.url().to_string(), sent));

            let resp = http::Response::builder().status(self.status).body(self.body).unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    #[tokio::test]
    async fn test_post_report_success() {
        let client = CannedClient::new(
            200,
            r#"{"ok":true,"stored":{"BusID":"10A","TimeStamp":1735689600,"Latitude":17.4376,"Longitude":78.4483,"SpeedKmph":20.0,"Status":"ACTIVE","Route":"R","NextStop":"Ameerpet","DistanceToStopKm":0.011}}"#,
        );
        let report = PositionReport::new("10a", 17.4376, 78.4483);

        let reply = post_report(&client, "http://localhost:8080/", &report).await.unwrap();
        assert!(reply.ok);
        assert_eq!(reply.stored.unwrap().next_stop_name, "Ameerpet");

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].0, "http://localhost:8080/api/v1/track");
        let sent: serde_json::Value = serde_json::from_slice(&seen[0].1).unwrap();
        assert_eq!(sent["bus_id"], "10a");
        assert!(sent.get("timestamp").is_none());
    }

    #[tokio::test]
    async fn test_post_report_rejection_is_not_an_error() {
        let client = CannedClient::new(400, r#"{"ok":false,"error":"Unknown bus_id 99Z","code":"unknown_vehicle"}"#);
        let reply = post_report(&client, "http://localhost:8080", &PositionReport::new("99Z", 0.0, 0.0))
            .await
            .unwrap();
        assert!(!reply.ok);
        assert_eq!(reply.error.as_deref(), Some("Unknown bus_id 99Z"));
    }

    #[tokio::test]
    async fn test_post_report_garbage_reply() {
        let client = CannedClient::new(502, "<html>bad gateway</html>");
        assert!(post_report(&client, "http://localhost:8080", &PositionReport::new("10A", 0.0, 0.0))
            .await
            .is_err());
    }
}
