//! Process configuration read from the environment (after `.env` is loaded).

use anyhow::{Context, Result, bail};
use std::env;
use std::str::FromStr;

use crate::catalog::RouteCatalog;
use crate::pipeline::DEFAULT_ALERT_RADIUS_KM;

/// Where position history is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryBackend {
    DynamoDb,
    Memory,
}

impl FromStr for HistoryBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dynamodb" => Ok(Self::DynamoDb),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown HISTORY_BACKEND '{other}' (expected 'dynamodb' or 'memory')"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub aws_region: String,
    pub history_table: String,
    pub history_backend: HistoryBackend,
    /// SNS topic for proximity alerts. Alerts are only logged when unset.
    pub alert_topic_arn: Option<String>,
    pub route_catalog_path: Option<String>,
    pub bind_addr: String,
    pub default_alert_radius_km: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            aws_region: "ap-south-2".to_string(),
            history_table: "BusRoute".to_string(),
            history_backend: HistoryBackend::DynamoDb,
            alert_topic_arn: None,
            route_catalog_path: None,
            bind_addr: "0.0.0.0:8080".to_string(),
            default_alert_radius_km: DEFAULT_ALERT_RADIUS_KM,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let history_backend = get("HISTORY_BACKEND")
            .map(|v| v.parse::<HistoryBackend>())
            .transpose()?
            .unwrap_or(defaults.history_backend);

        let default_alert_radius_km = match get("DEFAULT_ALERT_RADIUS_KM") {
            Some(v) => {
                let radius: f64 = v
                    .trim()
                    .parse()
                    .with_context(|| format!("DEFAULT_ALERT_RADIUS_KM '{v}' is not a number"))?;
                if !radius.is_finite() || radius < 0.0 {
                    bail!("DEFAULT_ALERT_RADIUS_KM must be a non-negative number, got {v}");
                }
                radius
            }
            None => defaults.default_alert_radius_km,
        };

        Ok(Self {
            aws_region: get("AWS_REGION").unwrap_or(defaults.aws_region),
            history_table: get("HISTORY_TABLE").unwrap_or(defaults.history_table),
            history_backend,
            alert_topic_arn: get("ALERT_TOPIC_ARN"),
            route_catalog_path: get("ROUTE_CATALOG_PATH"),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            default_alert_radius_km,
        })
    }

    /// Loads the configured catalog, or the built-in seed.
    pub fn load_catalog(&self) -> Result<RouteCatalog> {
        match &self.route_catalog_path {
            Some(path) => RouteCatalog::load(path),
            None => RouteCatalog::builtin(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.aws_region, "ap-south-2");
        assert_eq!(s.history_table, "BusRoute");
        assert_eq!(s.history_backend, HistoryBackend::DynamoDb);
        assert_eq!(s.alert_topic_arn, None);
        assert_eq!(s.bind_addr, "0.0.0.0:8080");
        assert_eq!(s.default_alert_radius_km, 0.5);
        assert_eq!(s.load_catalog().unwrap().len(), 3);
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("HISTORY_BACKEND", "Memory"),
            ("ALERT_TOPIC_ARN", "arn:aws:sns:ap-south-2:000000000000:alerts"),
            ("DEFAULT_ALERT_RADIUS_KM", "1.25"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("HISTORY_TABLE", "  "),
        ])
        .unwrap();

        assert_eq!(s.history_backend, HistoryBackend::Memory);
        assert_eq!(s.alert_topic_arn.as_deref(), Some("arn:aws:sns:ap-south-2:000000000000:alerts"));
        assert_eq!(s.default_alert_radius_km, 1.25);
        assert_eq!(s.bind_addr, "127.0.0.1:9000");
        assert_eq!(s.history_table, "BusRoute");
    }

    #[test]
    fn test_invalid_values() {
        assert!(settings(&[("HISTORY_BACKEND", "postgres")]).is_err());
        assert!(settings(&[("DEFAULT_ALERT_RADIUS_KM", "-1")]).is_err());
        assert!(settings(&[("DEFAULT_ALERT_RADIUS_KM", "half")]).is_err());
    }
}
