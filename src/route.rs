use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::coords::GeoPoint;

/// Errors from the POI and routing backends.
#[derive(Debug, Clone)]
pub enum RouteError {
    NetworkTimeout,
    HttpError(u16),
    ParseError(String),
    NoData,
    UnknownError(String),
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::NetworkTimeout => write!(f, "network timeout"),
            RouteError::HttpError(code) => write!(f, "HTTP error: {}", code),
            RouteError::ParseError(msg) => write!(f, "parse error: {}", msg),
            RouteError::NoData => write!(f, "no data returned"),
            RouteError::UnknownError(msg) => write!(f, "unknown error: {}", msg),
        }
    }
}

impl std::error::Error for RouteError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteStatus {
    Ok,
    Error,
}

/// Road-network route: a high-resolution poly-line suitable for smooth
/// animation, plus the total path length. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub points: Vec<GeoPoint>,
    pub length_km: f64,
    pub status: RouteStatus,
}

/// A route paired with the travel time derived from the assumed speed.
#[derive(Clone, Debug)]
pub struct ResolvedRoute {
    pub route: Route,
    pub duration_ms: u64,
    pub eta: String,
}

/// One point-of-interest hit from the geocoding backend.
#[derive(Clone, Debug)]
pub struct Poi {
    pub location: GeoPoint,
    pub label: String,
}

/// POI/geocoding backend seam.
pub trait PoiLookup {
    fn query(
        &self,
        near: GeoPoint,
        category: &str,
        max_results: usize,
        radius_deg: f64,
    ) -> impl std::future::Future<Output = Result<Vec<Poi>, RouteError>> + Send;
}

/// Routing backend seam. Waypoints are ordered start → destination.
pub trait RoutingBackend {
    fn route(
        &self,
        waypoints: &[GeoPoint],
    ) -> impl std::future::Future<Output = Result<Route, RouteError>> + Send;
}

/// Travel time at a fixed assumed speed.
pub fn duration_for(length_km: f64, speed_kmh: f64) -> u64 {
    let time_hours = length_km / speed_kmh;
    (time_hours * 3_600_000.0) as u64
}

/// Whole-minute ETA string, clamped to "< 1 min" under a minute.
pub fn eta_string(duration_ms: u64) -> String {
    let minutes = duration_ms / 60_000;
    if minutes < 1 {
        "< 1 min".to_string()
    } else {
        format!("{} min", minutes)
    }
}

/// Resolves a responder start point and the road route to the incident.
///
/// Start point resolution tries the nearest facility of the configured
/// category; on lookup failure or an empty result it falls back to a
/// synthetic offset from the incident (a documented stand-in, not a real
/// dispatch origin). Routing failures soft-fail into a degenerate
/// straight-line route so the caller can still show something moving.
pub struct RouteProvider<P: PoiLookup, R: RoutingBackend> {
    poi: P,
    routing: R,
    category: String,
    max_results: usize,
    radius_deg: f64,
    fallback_offset_deg: f64,
    speed_kmh: f64,
}

impl<P: PoiLookup, R: RoutingBackend> RouteProvider<P, R> {
    pub fn new(poi: P, routing: R, config: &crate::config::Config) -> Self {
        RouteProvider {
            poi,
            routing,
            category: config.poi_category.clone(),
            max_results: config.poi_max_results,
            radius_deg: config.poi_radius_deg,
            fallback_offset_deg: config.fallback_offset_deg,
            speed_kmh: config.assumed_speed_kmh,
        }
    }

    /// Nearest facility, or the synthetic offset when the lookup fails
    /// or comes back empty.
    async fn resolve_start(&self, incident: GeoPoint) -> GeoPoint {
        match self
            .poi
            .query(incident, &self.category, self.max_results, self.radius_deg)
            .await
        {
            Ok(pois) if !pois.is_empty() => {
                let closest = pois
                    .iter()
                    .min_by(|a, b| {
                        let da = a.location.distance_m(&incident);
                        let db = b.location.distance_m(&incident);
                        da.total_cmp(&db)
                    })
                    .map(|p| p.location);
                match closest {
                    Some(point) => point,
                    None => self.synthetic_start(incident),
                }
            }
            Ok(_) => {
                log::warn!("no {} found near incident, using synthetic start", self.category);
                self.synthetic_start(incident)
            }
            Err(err) => {
                log::warn!("POI lookup failed ({}), using synthetic start", err);
                self.synthetic_start(incident)
            }
        }
    }

    fn synthetic_start(&self, incident: GeoPoint) -> GeoPoint {
        GeoPoint::new(
            incident.lat + self.fallback_offset_deg,
            incident.lon + self.fallback_offset_deg,
        )
    }

    /// Full resolution: start point, road route, travel duration and ETA.
    /// Never fails hard: every backend failure degrades to a route the
    /// animator can still play.
    pub async fn resolve_route(&self, incident: GeoPoint) -> ResolvedRoute {
        let start = self.resolve_start(incident).await;

        let route = match self.routing.route(&[start, incident]).await {
            Ok(route) if !route.points.is_empty() => {
                if route.status == RouteStatus::Error {
                    log::warn!("routing backend reported an error status, animating anyway");
                }
                route
            }
            Ok(_) | Err(_) => {
                // Degenerate straight-line stand-in so the dispatch still
                // shows a responder moving.
                log::warn!("routing failed, falling back to straight-line route");
                Route {
                    points: vec![start, incident],
                    length_km: start.distance_m(&incident) / 1000.0,
                    status: RouteStatus::Error,
                }
            }
        };

        let duration_ms = duration_for(route.length_km, self.speed_kmh);
        let eta = eta_string(duration_ms);

        ResolvedRoute {
            route,
            duration_ms,
            eta,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP clients
// ---------------------------------------------------------------------------

const USER_AGENT: &str = "roadguard/0.1";

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

/// Nominatim search client for facility lookup.
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        NominatimClient {
            client,
            base_url: "https://nominatim.openstreetmap.org".to_string(),
        }
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let mut c = Self::new();
        c.base_url = base_url.trim_end_matches('/').to_string();
        c
    }

    fn parse_places(body: &str) -> Result<Vec<Poi>, RouteError> {
        let places: Vec<NominatimPlace> =
            serde_json::from_str(body).map_err(|e| RouteError::ParseError(e.to_string()))?;

        let pois = places
            .into_iter()
            .filter_map(|p| {
                let lat = p.lat.parse::<f64>().ok()?;
                let lon = p.lon.parse::<f64>().ok()?;
                Some(Poi {
                    location: GeoPoint::new(lat, lon),
                    label: p.display_name,
                })
            })
            .collect();
        Ok(pois)
    }
}

impl Default for NominatimClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PoiLookup for NominatimClient {
    async fn query(
        &self,
        near: GeoPoint,
        category: &str,
        max_results: usize,
        radius_deg: f64,
    ) -> Result<Vec<Poi>, RouteError> {
        // Bounded viewbox search around the incident.
        let url = format!(
            "{}/search?q={}&format=json&limit={}&bounded=1&viewbox={},{},{},{}",
            self.base_url,
            category,
            max_results,
            near.lon - radius_deg,
            near.lat + radius_deg,
            near.lon + radius_deg,
            near.lat - radius_deg,
        );

        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_timeout() {
                    return Err(RouteError::NetworkTimeout);
                }
                return Err(RouteError::UnknownError(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(RouteError::HttpError(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RouteError::UnknownError(e.to_string()))?;

        Self::parse_places(&body)
    }
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    /// Meters.
    distance: f64,
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    /// GeoJSON order: [lon, lat].
    coordinates: Vec<[f64; 2]>,
}

/// OSRM driving-route client.
pub struct OsrmClient {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        OsrmClient {
            client,
            base_url: "https://router.project-osrm.org".to_string(),
        }
    }

    pub fn with_base_url(base_url: &str) -> Self {
        let mut c = Self::new();
        c.base_url = base_url.trim_end_matches('/').to_string();
        c
    }

    fn parse_route(body: &str) -> Result<Route, RouteError> {
        let parsed: OsrmResponse =
            serde_json::from_str(body).map_err(|e| RouteError::ParseError(e.to_string()))?;

        let first = match parsed.routes.into_iter().next() {
            Some(r) => r,
            None => return Err(RouteError::NoData),
        };

        let points: Vec<GeoPoint> = first
            .geometry
            .coordinates
            .iter()
            .map(|c| GeoPoint::new(c[1], c[0]))
            .collect();

        if points.is_empty() {
            return Err(RouteError::NoData);
        }

        let status = if parsed.code == "Ok" {
            RouteStatus::Ok
        } else {
            RouteStatus::Error
        };

        Ok(Route {
            points,
            length_km: first.distance / 1000.0,
            status,
        })
    }
}

impl Default for OsrmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingBackend for OsrmClient {
    async fn route(&self, waypoints: &[GeoPoint]) -> Result<Route, RouteError> {
        if waypoints.len() < 2 {
            return Err(RouteError::NoData);
        }

        let coords = waypoints
            .iter()
            .map(|p| format!("{},{}", p.lon, p.lat))
            .collect::<Vec<_>>()
            .join(";");
        let url = format!(
            "{}/route/v1/driving/{}?overview=full&geometries=geojson",
            self.base_url, coords
        );

        let response = match self.client.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_timeout() {
                    return Err(RouteError::NetworkTimeout);
                }
                return Err(RouteError::UnknownError(e.to_string()));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(RouteError::HttpError(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RouteError::UnknownError(e.to_string()))?;

        Self::parse_route(&body)
    }
}
