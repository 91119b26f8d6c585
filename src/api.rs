use crate::model::{ActiveRoute, ConfiguredRoute, Departure, Operator, Station};
use crate::server::state::Board;
use askama::Template;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use chrono_tz::America::Los_Angeles;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Departure as shown to a rider; minutes are computed when the view is built.
#[derive(Serialize)]
pub struct DepartureView {
    pub id: Uuid,
    pub line_name: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub local_time: String,
    pub minutes_until: i64,
    pub time_string: String,
    pub is_real_time: bool,
}

impl DepartureView {
    pub fn new(departure: &Departure, now: DateTime<Utc>) -> Self {
        Self {
            id: departure.id,
            line_name: departure.line_name.clone(),
            destination: departure.destination.clone(),
            departure_time: departure.departure_time,
            local_time: local_time(departure.departure_time),
            minutes_until: departure.minutes_until(now),
            time_string: departure.time_string(now),
            is_real_time: departure.is_real_time,
        }
    }
}

pub fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Los_Angeles).format("%H:%M").to_string()
}

#[derive(Serialize)]
pub struct ActiveRouteView {
    pub route_id: Uuid,
    pub name: String,
    pub display_name: String,
    pub operator_id: String,
    pub line_id: String,
    pub is_reversed: bool,
    pub departure_station: Station,
    pub arrival_station: Option<Station>,
}

impl From<&ActiveRoute> for ActiveRouteView {
    fn from(active: &ActiveRoute) -> Self {
        Self {
            route_id: active.route.id,
            name: active.route.name.clone(),
            display_name: active.display_name(),
            operator_id: active.route.operator_id.clone(),
            line_id: active.route.line_id.clone(),
            is_reversed: active.is_reversed,
            departure_station: active.departure_station().clone(),
            arrival_station: active.arrival_station().cloned(),
        }
    }
}

#[derive(Serialize)]
pub struct DepartureBoard {
    pub route: Option<ActiveRouteView>,
    pub departures: Vec<DepartureView>,
    pub error: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl DepartureBoard {
    /// Only shows what the board holds when it was fetched for `active`.
    pub fn new(active: Option<&ActiveRoute>, board: &Board, now: DateTime<Utc>) -> Self {
        let route = active.map(ActiveRouteView::from);
        if active.is_none() || board.route.as_ref() != active {
            return Self {
                route,
                departures: Vec::new(),
                error: None,
                fetched_at: None,
            };
        }
        Self {
            route,
            departures: board
                .departures
                .iter()
                .map(|departure| DepartureView::new(departure, now))
                .collect(),
            error: board.error.clone(),
            fetched_at: board.fetched_at,
        }
    }
}

/// Body of `POST /routes`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRoute {
    pub name: String,
    pub operator_id: String,
    #[serde(default)]
    pub line_id: String,
    pub origin_station: Station,
    #[serde(default)]
    pub destination_station: Option<Station>,
}

impl NewRoute {
    /// Checks what a route needs to be resolvable and queryable.
    pub fn validate(self) -> Result<ConfiguredRoute, String> {
        if self.name.trim().is_empty() {
            return Err("Route name is required".into());
        }
        let operator = Operator::from_id(&self.operator_id)
            .ok_or_else(|| format!("Unsupported operator {}", self.operator_id))?;
        let stations = std::iter::once(&self.origin_station).chain(self.destination_station.iter());
        for station in stations {
            if station.id.trim().is_empty() || station.name.trim().is_empty() {
                return Err("Stations need a stop code and a name".into());
            }
            if station.coordinate.is_some_and(|c| !c.is_valid()) {
                return Err(format!("Coordinate of {} is out of range", station.name));
            }
        }
        Ok(ConfiguredRoute::new(
            self.name.trim().to_string(),
            operator.id().to_string(),
            self.line_id.trim().to_string(),
            self.origin_station,
            self.destination_station,
        ))
    }
}

#[derive(Serialize)]
pub struct Healthy {
    pub last_successful_sync: Option<u32>,
    pub next_sync_attempt: Option<u32>,
    pub healthy: bool,
}

impl IntoResponse for Healthy {
    fn into_response(self) -> Response {
        let status = if self.healthy {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, Json(self)).into_response()
    }
}

#[derive(Template)]
#[template(path = "departures.html")]
pub struct DeparturesPage {
    pub board: DepartureBoard,
    pub timestamp: String,
}

impl DeparturesPage {
    pub fn new(board: DepartureBoard, now: DateTime<Utc>) -> Self {
        let timestamp = now
            .with_timezone(&Los_Angeles)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        Self { board, timestamp }
    }
}
