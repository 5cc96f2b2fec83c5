//! Read-only route reference data.
//!
//! The catalog maps an upper-cased vehicle identifier to its route and is
//! built once at startup. The seed is a JSON object:
//! ```json
//! {
//!   "10A": {
//!     "route": "Secunderabad → Mehdipatnam",
//!     "stops": [{ "name": "Ameerpet", "lat": 17.4375, "lon": 78.4483 }],
//!     "frequency": "Every 10 mins",
//!     "type": "AC"
//!   }
//! }
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const BUILTIN_SEED: &str = include_str!("../data/routes.json");

/// A named waypoint on a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub name: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

impl Stop {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self { name: name.into(), latitude, longitude }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDefinition {
    #[serde(rename = "bus_id")]
    pub vehicle_id: String,
    #[serde(rename = "route")]
    pub route_label: String,
    pub stops: Vec<Stop>,
    #[serde(rename = "frequency")]
    pub service_frequency_label: String,
    #[serde(rename = "type")]
    pub vehicle_class: String,
}

impl RouteDefinition {
    pub fn stop_names(&self) -> impl Iterator<Item = &str> {
        self.stops.iter().map(|s| s.name.as_str())
    }
}

#[derive(Deserialize)]
struct RouteSeed {
    route: String,
    stops: Vec<Stop>,
    #[serde(default)]
    frequency: String,
    #[serde(rename = "type", default)]
    vehicle_class: String,
}

/// Immutable vehicle → route mapping. Safe to share behind an `Arc` without locking.
#[derive(Debug, Clone, Default)]
pub struct RouteCatalog {
    routes: BTreeMap<String, RouteDefinition>,
}

impl RouteCatalog {
    /// Builds a catalog from already-constructed definitions. Keys are upper-cased.
    pub fn from_routes(routes: impl IntoIterator<Item = RouteDefinition>) -> Self {
        let routes = routes
            .into_iter()
            .map(|mut r| {
                r.vehicle_id = r.vehicle_id.trim().to_uppercase();
                (r.vehicle_id.clone(), r)
            })
            .collect();
        Self { routes }
    }

    /// Parses a JSON seed. Rejects blank ids, ids that collide after
    /// upper-casing, and routes without stops.
    pub fn from_json(json: &str) -> Result<Self> {
        let seed: BTreeMap<String, RouteSeed> =
            serde_json::from_str(json).context("route catalog is not valid JSON")?;

        let mut routes = BTreeMap::new();
        for (raw_id, entry) in seed {
            let vehicle_id = raw_id.trim().to_uppercase();
            if vehicle_id.is_empty() {
                bail!("route catalog contains a blank bus id");
            }
            if entry.stops.is_empty() {
                bail!("route for bus {vehicle_id} has no stops");
            }
            let route = RouteDefinition {
                vehicle_id: vehicle_id.clone(),
                route_label: entry.route,
                stops: entry.stops,
                service_frequency_label: entry.frequency,
                vehicle_class: entry.vehicle_class,
            };
            if routes.insert(vehicle_id.clone(), route).is_some() {
                bail!("bus id {vehicle_id} appears more than once in the route catalog");
            }
        }

        debug!(routes = routes.len(), "Route catalog parsed");
        Ok(Self { routes })
    }

    /// Loads the seed from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read route catalog '{path}'"))?;
        Self::from_json(&content).with_context(|| format!("invalid route catalog '{path}'"))
    }

    /// The Hyderabad seed shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_SEED)
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, vehicle_id: &str) -> Option<&RouteDefinition> {
        self.routes.get(&vehicle_id.trim().to_uppercase())
    }

    /// Routes ordered by vehicle id.
    pub fn iter(&self) -> impl Iterator<Item = &RouteDefinition> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_seed_loads() {
        let catalog = RouteCatalog::builtin().unwrap();
        assert_eq!(catalog.len(), 3);

        let route = catalog.lookup("10A").unwrap();
        assert_eq!(route.route_label, "Secunderabad → Mehdipatnam");
        assert_eq!(route.stops.len(), 5);
        assert_eq!(route.stops[2], Stop::new("Ameerpet", 17.4375, 78.4483));
        assert_eq!(route.service_frequency_label, "Every 10 mins");
        assert_eq!(route.vehicle_class, "AC");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let catalog = RouteCatalog::builtin().unwrap();
        assert!(catalog.lookup("100m").is_some());
        assert!(catalog.lookup(" 65g ").is_some());
        assert!(catalog.lookup("99Z").is_none());
    }

    #[test]
    fn test_seed_keys_are_upper_cased() {
        let catalog = RouteCatalog::from_json(
            r#"{"7x": {"route": "A → B", "stops": [{"name": "A", "lat": 1.0, "lon": 2.0}]}}"#,
        )
        .unwrap();
        let route = catalog.lookup("7X").unwrap();
        assert_eq!(route.vehicle_id, "7X");
        assert_eq!(route.service_frequency_label, "");
    }

    #[test]
    fn test_rejects_route_without_stops() {
        let err = RouteCatalog::from_json(r#"{"1A": {"route": "A", "stops": []}}"#).unwrap_err();
        assert!(err.to_string().contains("no stops"));
    }

    #[test]
    fn test_rejects_ids_colliding_after_upper_casing() {
        let json = r#"{
            "1a": {"route": "A", "stops": [{"name": "A", "lat": 1.0, "lon": 2.0}]},
            "1A": {"route": "B", "stops": [{"name": "B", "lat": 1.0, "lon": 2.0}]}
        }"#;
        assert!(RouteCatalog::from_json(json).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(RouteCatalog::load("/nonexistent/routes.json").is_err());
    }
}
