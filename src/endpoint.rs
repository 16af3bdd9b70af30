/// HTTP endpoint for the analytics reports and reading ingestion
///
/// A small JSON API over `AnalyticsService`. Every report is recomputed from
/// the store on each request.
///
/// Endpoints:
/// - GET  /health                               - Service health check
/// - GET  /api/analytics/predictions            - Six-hour forecasts
/// - GET  /api/analytics/trends                 - Rising / falling / stable
/// - GET  /api/analytics/correlations           - Correlated station pairs
/// - GET  /api/analytics/risk-forecast          - Time-to-threshold tiers
/// - GET  /api/analytics/statistics             - Trailing 24h statistics
/// - GET  /api/stations                         - Stations with latest reading
/// - GET  /api/stations/{station_id}            - One station
/// - POST /api/stations                         - Register a station
/// - PUT  /api/stations/{station_id}            - Replace station thresholds
/// - GET  /api/readings/{station_id}?limit=N    - Reading history, newest first
/// - POST /api/readings                         - Submit a sensor reading

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::Cursor;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

use crate::analysis::AnalyticsError;
use crate::analysis::reports::AnalyticsService;
use crate::model::{Location, Reading, Station, StoreError, Thresholds};
use crate::store;

/// Readings returned by the history route when no `limit` is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /api/readings`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReading {
    pub station_id: String,
    pub water_level: f64,
    pub battery_level: i64,
}

/// Body of `POST /api/stations`. Thresholds default to 5.0 / 7.0.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStation {
    pub station_id: String,
    pub name: String,
    pub location: Location,
    #[serde(default)]
    pub thresholds: Thresholds,
}

/// Body of `PUT /api/stations/{station_id}`.
#[derive(Debug, Deserialize)]
pub struct ThresholdUpdate {
    pub thresholds: Thresholds,
}

/// Station listing entry: the station plus its most recent reading.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationStatus {
    #[serde(flatten)]
    pub station: Station,
    pub current_reading: Option<Reading>,
}

/// Status code and JSON body, independent of the HTTP transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn ok<T: Serialize>(status: u16, payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(body) => Self { status, body },
            Err(e) => Self::error(500, format!("Failed to serialize response: {}", e)),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Health,
    Predictions,
    Trends,
    Correlations,
    RiskForecast,
    Statistics,
    ListStations,
    GetStation(&'a str),
    CreateStation,
    UpdateThresholds(&'a str),
    ReadingHistory { station_id: &'a str, limit: usize },
    RecordReading,
    NotFound,
}

/// The id segment after `prefix`, if the path is exactly `prefix{id}`.
fn path_id<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    path.strip_prefix(prefix)
        .filter(|id| !id.is_empty() && !id.contains('/'))
}

/// `limit=N` from a query string. Missing, zero or unparseable values fall
/// back to the default.
fn history_limit(query: &str) -> usize {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "limit")
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
}

fn route<'a>(method: &Method, url: &'a str) -> Route<'a> {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let path = path.trim_end_matches('/');

    match (method, path) {
        (Method::Get, "/health") => Route::Health,
        (Method::Get, "/api/analytics/predictions") => Route::Predictions,
        (Method::Get, "/api/analytics/trends") => Route::Trends,
        (Method::Get, "/api/analytics/correlations") => Route::Correlations,
        (Method::Get, "/api/analytics/risk-forecast") => Route::RiskForecast,
        (Method::Get, "/api/analytics/statistics") => Route::Statistics,
        (Method::Get, "/api/stations") => Route::ListStations,
        (Method::Post, "/api/stations") => Route::CreateStation,
        (Method::Post, "/api/readings") => Route::RecordReading,
        (Method::Get, p) => {
            if let Some(id) = path_id(p, "/api/stations/") {
                Route::GetStation(id)
            } else if let Some(id) = path_id(p, "/api/readings/") {
                Route::ReadingHistory {
                    station_id: id,
                    limit: history_limit(query),
                }
            } else {
                Route::NotFound
            }
        }
        (Method::Put, p) => path_id(p, "/api/stations/").map_or(Route::NotFound, Route::UpdateThresholds),
        _ => Route::NotFound,
    }
}

/// Dispatches one request against the service.
pub fn handle(service: &AnalyticsService, method: &Method, url: &str, body: &str) -> ApiResponse {
    match route(method, url) {
        Route::Health => handle_health(),
        Route::Predictions => report(service.predictions()),
        Route::Trends => report(service.trends()),
        Route::Correlations => report(service.correlations()),
        Route::RiskForecast => report(service.risk_forecast()),
        Route::Statistics => report(service.statistics()),
        Route::ListStations => handle_list_stations(service),
        Route::GetStation(station_id) => handle_get_station(service, station_id),
        Route::CreateStation => handle_create_station(service, body),
        Route::UpdateThresholds(station_id) => handle_update_thresholds(service, station_id, body),
        Route::ReadingHistory { station_id, limit } => handle_reading_history(service, station_id, limit),
        Route::RecordReading => handle_record_reading(service, body),
        Route::NotFound => ApiResponse {
            status: 404,
            body: json!({
                "error": "Not found",
                "available_endpoints": [
                    "GET /health",
                    "GET /api/analytics/{predictions,trends,correlations,risk-forecast,statistics}",
                    "GET /api/stations",
                    "GET /api/stations/{station_id}",
                    "POST /api/stations",
                    "PUT /api/stations/{station_id}",
                    "GET /api/readings/{station_id}?limit=N",
                    "POST /api/readings"
                ]
            }),
        },
    }
}

fn report<T: Serialize>(result: Result<T, AnalyticsError>) -> ApiResponse {
    match result {
        Ok(report) => ApiResponse::ok(200, &report),
        Err(e) => {
            error!(error = %e, "report failed");
            ApiResponse::error(500, e.to_string())
        }
    }
}

fn store_error(e: StoreError) -> ApiResponse {
    match e {
        StoreError::StationNotFound(_) => ApiResponse::error(404, "Station not found"),
        StoreError::InvalidReading(msg) | StoreError::InvalidStation(msg) => ApiResponse::error(400, msg),
        StoreError::DuplicateStation(id) => ApiResponse::error(409, format!("Station {} already exists", id)),
        other => {
            error!(error = %other, "store request failed");
            ApiResponse::error(500, other.to_string())
        }
    }
}

/// Handle /health endpoint
fn handle_health() -> ApiResponse {
    ApiResponse {
        status: 200,
        body: json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        }),
    }
}

fn handle_list_stations(service: &AnalyticsService) -> ApiResponse {
    let fetch = || -> Result<Vec<StationStatus>, StoreError> {
        service
            .registry()
            .list_stations()?
            .into_iter()
            .map(|station| -> Result<StationStatus, StoreError> {
                let current_reading = service
                    .store()
                    .fetch_recent(&station.station_id, 1)?
                    .into_iter()
                    .next();
                Ok(StationStatus {
                    station,
                    current_reading,
                })
            })
            .collect()
    };

    match fetch() {
        Ok(stations) => ApiResponse::ok(200, &stations),
        Err(e) => store_error(e),
    }
}

fn handle_get_station(service: &AnalyticsService, station_id: &str) -> ApiResponse {
    match service.registry().find_station(station_id) {
        Ok(Some(station)) => ApiResponse::ok(200, &station),
        Ok(None) => store_error(StoreError::StationNotFound(station_id.to_string())),
        Err(e) => store_error(e),
    }
}

fn handle_create_station(service: &AnalyticsService, body: &str) -> ApiResponse {
    let input: NewStation = match serde_json::from_str(body) {
        Ok(input) => input,
        Err(e) => return ApiResponse::error(400, format!("Invalid station body: {}", e)),
    };

    let station = Station {
        station_id: input.station_id,
        name: input.name,
        location: input.location,
        thresholds: input.thresholds,
        last_updated: Utc::now(),
    };
    match store::register_station(service.registry().as_ref(), station) {
        Ok(station) => {
            info!(station_id = %station.station_id, "station registered");
            ApiResponse::ok(201, &station)
        }
        Err(e) => store_error(e),
    }
}

fn handle_reading_history(service: &AnalyticsService, station_id: &str, limit: usize) -> ApiResponse {
    match service.store().fetch_recent(station_id, limit) {
        Ok(readings) => ApiResponse::ok(200, &readings),
        Err(e) => store_error(e),
    }
}

fn handle_record_reading(service: &AnalyticsService, body: &str) -> ApiResponse {
    let input: NewReading = match serde_json::from_str(body) {
        Ok(input) => input,
        Err(e) => return ApiResponse::error(400, format!("Invalid reading body: {}", e)),
    };

    match store::record_reading(
        service.registry().as_ref(),
        service.store().as_ref(),
        &input.station_id,
        input.water_level,
        input.battery_level,
        Utc::now(),
    ) {
        Ok(reading) => {
            debug!(
                station_id = %reading.station_id,
                level = reading.water_level,
                status = %reading.status,
                "reading recorded"
            );
            ApiResponse::ok(
                201,
                &json!({
                    "success": true,
                    "alert": reading.status,
                    "reading": reading
                }),
            )
        }
        Err(e) => store_error(e),
    }
}

fn handle_update_thresholds(service: &AnalyticsService, station_id: &str, body: &str) -> ApiResponse {
    let input: ThresholdUpdate = match serde_json::from_str(body) {
        Ok(input) => input,
        Err(e) => return ApiResponse::error(400, format!("Invalid thresholds body: {}", e)),
    };
    if input.thresholds.warning >= input.thresholds.danger {
        warn!(
            station_id,
            warning = input.thresholds.warning,
            danger = input.thresholds.danger,
            "accepting thresholds with warning not below danger"
        );
    }

    match service.registry().update_thresholds(station_id, input.thresholds) {
        Ok(station) => {
            info!(station_id, "thresholds updated");
            ApiResponse::ok(200, &station)
        }
        Err(e) => store_error(e),
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start HTTP endpoint server on the specified port. Blocks forever.
pub fn start_endpoint_server(port: u16, service: AnalyticsService) -> Result<(), String> {
    let server = Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    info!(port, "HTTP endpoint listening");

    for mut request in server.incoming_requests() {
        let response = match read_body(&mut request) {
            Ok(body) => handle(&service, request.method(), request.url(), &body),
            Err(e) => ApiResponse::error(400, format!("Failed to read request body: {}", e)),
        };
        debug!(method = %request.method(), url = request.url(), status = response.status, "request handled");

        if let Err(e) = request.respond(create_response(&response)) {
            warn!(error = %e, "failed to send response");
        }
    }

    Ok(())
}

fn read_body(request: &mut Request) -> std::io::Result<String> {
    let mut body = String::new();
    request.as_reader().read_to_string(&mut body)?;
    Ok(body)
}

/// Create HTTP response with JSON body
fn create_response(response: &ApiResponse) -> Response<Cursor<Vec<u8>>> {
    let body = serde_json::to_string_pretty(&response.body)
        .unwrap_or_else(|_| r#"{"error":"unserializable response"}"#.to_string());

    let http = Response::from_data(body.into_bytes()).with_status_code(StatusCode(response.status));
    match Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => http.with_header(header),
        Err(()) => http,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
