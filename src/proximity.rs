use crate::catalog::RouteDefinition;
use crate::error::ResolveError;
use crate::geo::distance_km;

/// The closest stop on a route to a reported position.
#[derive(Debug, Clone, PartialEq)]
pub struct NearestStop {
    pub name: String,
    pub distance_km: f64,
}

/// Finds the stop on `route` nearest to `(latitude, longitude)`.
///
/// On exact ties the stop that comes first in route order wins.
pub fn resolve(
    latitude: f64,
    longitude: f64,
    route: &RouteDefinition,
) -> Result<NearestStop, ResolveError> {
    let mut nearest: Option<(&str, f64)> = None;

    for stop in &route.stops {
        let d = distance_km(latitude, longitude, stop.latitude, stop.longitude);
        match nearest {
            Some((_, best)) if d >= best => {}
            _ => nearest = Some((&stop.name, d)),
        }
    }

    nearest
        .map(|(name, distance_km)| NearestStop { name: name.to_string(), distance_km })
        .ok_or_else(|| ResolveError::EmptyRoute(route.vehicle_id.clone()))
}
