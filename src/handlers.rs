// HTTP request handlers
use crate::api::{ActiveRouteView, DepartureBoard, DeparturesPage, Healthy, NewRoute};
use crate::model::{ConfiguredRoute, Coordinate, Operator, Station, TransitLine};
use crate::server::infra::WebappError;
use crate::server::state::{self, AppState};
use crate::transit_api;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

pub async fn root() -> impl IntoResponse {
    axum::response::Redirect::to("departures.html")
}

pub async fn healthy(State(app_state): State<AppState>) -> Healthy {
    let last_successful_sync = app_state.last_successful_sync.read().ok().map(|last| *last);
    let next_sync_attempt = app_state.next_sync.read().ok().map(|now| *now);
    let healthy = next_sync_attempt
        .and_then(|now| last_successful_sync.map(|then| now - then < 10))
        .unwrap_or(false);

    Healthy {
        last_successful_sync,
        next_sync_attempt,
        healthy,
    }
}

/// Takes a new location fix. When that changes which route or end is active, departures for the
/// new departure station are fetched in the background.
#[instrument(name = "put_location", skip(state))]
pub async fn put_location(
    State(state): State<AppState>,
    Json(coordinate): Json<Coordinate>,
) -> Response {
    if !coordinate.is_valid() {
        return (StatusCode::BAD_REQUEST, "Coordinate is out of range").into_response();
    }
    let before = state.active_route();
    let active = state.set_location(coordinate);
    if before != active && active.is_some() {
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(reason) = state::refresh(&state).await {
                error!("Unable to refresh departures: {reason}");
            }
        });
    }
    Json(active.as_ref().map(ActiveRouteView::from)).into_response()
}

pub async fn active(State(state): State<AppState>) -> Json<Option<ActiveRouteView>> {
    Json(state.active_route().as_ref().map(ActiveRouteView::from))
}

fn current_board(state: &AppState) -> DepartureBoard {
    let active = state.active_route();
    let board = state.board.read().unwrap();
    DepartureBoard::new(active.as_ref(), &board, Utc::now())
}

pub async fn departures(State(state): State<AppState>) -> Json<DepartureBoard> {
    Json(current_board(&state))
}

pub async fn departures_html(State(state): State<AppState>) -> DeparturesPage {
    DeparturesPage::new(current_board(&state), Utc::now())
}

#[derive(Deserialize)]
pub struct RefreshParams {
    /// Fetch even if the board was refreshed moments ago
    #[serde(default)]
    force: bool,
}

#[instrument(name = "refresh_now", skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    Query(params): Query<RefreshParams>,
) -> Result<Json<DepartureBoard>, WebappError> {
    if params.force {
        state::refresh(&state).await?;
    } else {
        state::refresh_if_needed(&state).await?;
    }
    Ok(Json(current_board(&state)))
}

pub async fn list_routes(State(state): State<AppState>) -> Json<Vec<ConfiguredRoute>> {
    Json(state.settings.read().unwrap().routes().to_vec())
}

#[instrument(name = "add_route", skip_all)]
pub async fn add_route(
    State(state): State<AppState>,
    Json(new_route): Json<NewRoute>,
) -> Result<Response, WebappError> {
    let route = match new_route.validate() {
        Ok(route) => route,
        Err(reason) => return Ok((StatusCode::BAD_REQUEST, reason).into_response()),
    };
    {
        state.settings.write().unwrap().add_route(route.clone())?;
    }
    info!("Added route {}", route.name);
    state.update_active_route();
    Ok((StatusCode::CREATED, Json(route)).into_response())
}

#[instrument(name = "delete_route", skip(state))]
pub async fn delete_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, WebappError> {
    let removed = { state.settings.write().unwrap().remove_route(id)? };
    match removed {
        Some(route) => {
            info!("Removed route {}", route.name);
            state.update_active_route();
            Ok(StatusCode::NO_CONTENT)
        }
        None => Ok(StatusCode::NOT_FOUND),
    }
}

#[instrument(name = "update_route", skip(state, new_route))]
pub async fn update_route(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(new_route): Json<NewRoute>,
) -> Result<Response, WebappError> {
    let route = match new_route.validate() {
        Ok(route) => ConfiguredRoute { id, ..route },
        Err(reason) => return Ok((StatusCode::BAD_REQUEST, reason).into_response()),
    };
    let updated = { state.settings.write().unwrap().update_route(route.clone())? };
    if !updated {
        return Ok(StatusCode::NOT_FOUND.into_response());
    }
    state.update_active_route();
    Ok(Json(route).into_response())
}

#[derive(Serialize)]
pub struct OperatorView {
    id: &'static str,
    name: &'static str,
}

pub async fn operators() -> Json<Vec<OperatorView>> {
    Json(
        Operator::ALL
            .iter()
            .map(|operator| OperatorView {
                id: operator.id(),
                name: operator.display_name(),
            })
            .collect(),
    )
}

#[derive(Serialize)]
pub struct Catalog {
    stops: Vec<Station>,
    lines: Vec<TransitLine>,
}

/// Stops and lines in one go, for the route editor.
#[instrument(name = "operator_catalog", skip(state))]
pub async fn operator_catalog(
    State(state): State<AppState>,
    Path(operator): Path<String>,
) -> Result<Response, WebappError> {
    let Some(operator) = Operator::from_id(&operator) else {
        return Ok((StatusCode::NOT_FOUND, "Unknown operator").into_response());
    };
    let config = state.transit_config()?;
    let (stops, lines) = transit_api::fetch_catalog(&config, operator.id()).await;
    Ok(Json(Catalog {
        stops: stops?,
        lines: lines?,
    })
    .into_response())
}

#[instrument(name = "operator_stops", skip(state))]
pub async fn operator_stops(
    State(state): State<AppState>,
    Path(operator): Path<String>,
) -> Result<Response, WebappError> {
    let Some(operator) = Operator::from_id(&operator) else {
        return Ok((StatusCode::NOT_FOUND, "Unknown operator").into_response());
    };
    let config = state.transit_config()?;
    let stations: Vec<Station> = transit_api::fetch_stations(&config, operator.id()).await?;
    Ok(Json(stations).into_response())
}

#[instrument(name = "operator_lines", skip(state))]
pub async fn operator_lines(
    State(state): State<AppState>,
    Path(operator): Path<String>,
) -> Result<Response, WebappError> {
    let Some(operator) = Operator::from_id(&operator) else {
        return Ok((StatusCode::NOT_FOUND, "Unknown operator").into_response());
    };
    let config = state.transit_config()?;
    let lines: Vec<TransitLine> = transit_api::fetch_lines(&config, operator.id()).await?;
    Ok(Json(lines).into_response())
}
