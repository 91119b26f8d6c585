// Application state and the periodic departure refresh
use crate::error::TransitError;
use crate::model::{ActiveRoute, Coordinate, Departure};
use crate::normalizer::DirectionMatch;
use crate::resolver;
use crate::settings::Settings;
use crate::transit_api::{self, Config};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use std::sync::{Arc, RwLock};
use std::time;
use tokio::sync::watch::Receiver;
use tracing::{error, info};

/// Manual refreshes closer together than this reuse the board.
pub const REFRESH_THRESHOLD_SECONDS: i64 = 30;

/// What the last fetch produced, and for which route. Replaced whole by every successful fetch.
#[derive(Clone, Debug, Default)]
pub struct Board {
    pub route: Option<ActiveRoute>,
    pub departures: Vec<Departure>,
    pub error: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<RwLock<Settings>>,
    pub location: Arc<RwLock<Option<Coordinate>>>,
    pub active: Arc<RwLock<Option<ActiveRoute>>>,
    pub board: Arc<RwLock<Board>>,
    pub last_successful_sync: Arc<RwLock<u32>>,
    pub next_sync: Arc<RwLock<u32>>,
    pub last_refresh: Arc<RwLock<Option<(ActiveRoute, DateTime<Utc>)>>>,
    pub api_url: String,
    pub client: Client,
    pub direction_match: DirectionMatch,
}

// PoisonError can only happen when a thread panics while holding one of these locks. None of
// the critical sections below can panic, so the unwraps on read() and write() are unreachable.
impl AppState {
    pub fn new(
        settings: Settings,
        api_url: String,
        client: Client,
        direction_match: DirectionMatch,
    ) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            location: Arc::new(RwLock::new(None)),
            active: Arc::new(RwLock::new(None)),
            board: Arc::new(RwLock::new(Board::default())),
            last_successful_sync: Arc::new(RwLock::new(0)),
            next_sync: Arc::new(RwLock::new(0)),
            last_refresh: Arc::new(RwLock::new(None)),
            api_url,
            client,
            direction_match,
        }
    }

    pub fn transit_config(&self) -> Result<Config, TransitError> {
        let settings = self.settings.read().unwrap();
        Config::from_settings(&settings, &self.api_url, self.client.clone())
    }

    pub fn active_route(&self) -> Option<ActiveRoute> {
        self.active.read().unwrap().clone()
    }

    /// Stores a new location fix and re-resolves the active route from it.
    pub fn set_location(&self, coordinate: Coordinate) -> Option<ActiveRoute> {
        {
            *self.location.write().unwrap() = Some(coordinate);
        }
        self.update_active_route()
    }

    /// Re-resolves the active route. Call after the location or the route list changed.
    /// A different active route empties the board, since its departures belong to another stop.
    pub fn update_active_route(&self) -> Option<ActiveRoute> {
        let location = *self.location.read().unwrap();
        let active = {
            let settings = self.settings.read().unwrap();
            resolver::resolve(location, settings.routes())
        };
        let mut current = self.active.write().unwrap();
        if *current != active {
            info!(
                "Active route is now {}",
                active
                    .as_ref()
                    .map(ActiveRoute::display_name)
                    .unwrap_or_else(|| "none".to_string())
            );
            *self.board.write().unwrap() = Board::default();
        }
        *current = active.clone();
        active
    }

    fn is_active(&self, route: &ActiveRoute) -> bool {
        self.active.read().unwrap().as_ref() == Some(route)
    }
}

/// Fetches departures for the active route and replaces the board with the outcome.
///
/// Without an active route there is nothing to fetch, and the board is left untouched.
/// A result for a route that stopped being active while it was fetched is discarded.
#[tracing::instrument(name = "refresh", skip_all)]
pub async fn refresh(state: &AppState) -> Result<(), TransitError> {
    let Some(active) = state.active_route() else {
        info!("No active route yet, nothing to refresh");
        return Ok(());
    };
    {
        *state.last_refresh.write().unwrap() = Some((active.clone(), Utc::now()));
    }
    let version = { *state.next_sync.read().unwrap() };
    {
        *state.next_sync.write().unwrap() += 1
    }

    let fetched = match state.transit_config() {
        Ok(config) => {
            transit_api::fetch_departures(&config, &active, state.direction_match).await
        }
        Err(err) => Err(err),
    };

    let now = Utc::now();
    if !state.is_active(&active) {
        info!("Dropping fetch for {}, no longer active", active.display_name());
        return fetched.map(|_| ());
    }
    match fetched {
        Ok(departures) => {
            info!(
                "route={} departures={}",
                active.display_name(),
                departures.len()
            );
            {
                *state.board.write().unwrap() = Board {
                    route: Some(active),
                    departures,
                    error: None,
                    fetched_at: Some(now),
                };
            }
            // We synced successfully, let's tell the health check
            {
                *state.last_successful_sync.write().unwrap() = version
            }
            Ok(())
        }
        Err(err) => {
            {
                let mut board = state.board.write().unwrap();
                if board.route.as_ref() != Some(&active) {
                    *board = Board {
                        route: Some(active),
                        ..Board::default()
                    };
                }
                board.error = Some(err.to_string());
                board.fetched_at = Some(now);
            }
            Err(err)
        }
    }
}

/// Refreshes unless the active route was refreshed less than
/// [`REFRESH_THRESHOLD_SECONDS`] ago. Returns whether a fetch was made.
pub async fn refresh_if_needed(state: &AppState) -> Result<bool, TransitError> {
    let Some(active) = state.active_route() else {
        return Ok(false);
    };
    let recent = {
        let last_refresh = state.last_refresh.read().unwrap();
        last_refresh.as_ref().is_some_and(|(route, at)| {
            *route == active && Utc::now() - *at < Duration::seconds(REFRESH_THRESHOLD_SECONDS)
        })
    };
    if recent {
        info!("Refreshed recently, keeping the board");
        return Ok(false);
    }
    refresh(state).await?;
    Ok(true)
}

pub fn set_up_fetch_job(
    fetch_interval_seconds: Option<u16>,
    recv_shutdown: Receiver<bool>,
    state: AppState,
) -> Option<tokio::task::JoinHandle<()>> {
    if let Some(interval_seconds) = fetch_interval_seconds {
        let mut recv_shutdown = recv_shutdown.clone();
        Some(tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(time::Duration::from_secs(interval_seconds as u64));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(reason) = refresh(&state).await {
                            error!("Unable to refresh departures: {reason}");
                        }
                    }
                    _ = recv_shutdown.changed() => {
                        if *recv_shutdown.borrow() {
                            info!("Shutdown job");
                            break;
                        }
                    }
                }
            }
        }))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DepartureBoard;
    use crate::model::{ConfiguredRoute, Station};
    use crate::settings::tests::{MemoryStore, route};
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn state() -> AppState {
        let mut settings = Settings::load(Box::new(MemoryStore::default()));
        settings.add_route(route("commute")).unwrap();
        AppState::new(
            settings,
            transit_api::API_URL.to_string(),
            Client::new(),
            DirectionMatch::default(),
        )
    }

    #[test]
    fn active_route_follows_location() {
        let state = state();
        assert_eq!(state.update_active_route(), None);

        // Montgomery is the destination end of the test route
        let active = state.set_location(Coordinate::new(37.7895, -122.4010)).unwrap();
        assert!(active.is_reversed);
        assert_eq!(state.active_route(), Some(active));

        let active = state.set_location(Coordinate::new(37.8036, -122.2715)).unwrap();
        assert!(!active.is_reversed);
    }

    #[test]
    fn removing_the_last_route_clears_the_active_route() {
        let state = state();
        let active = state.set_location(Coordinate::new(37.8, -122.3)).unwrap();
        {
            state
                .settings
                .write()
                .unwrap()
                .remove_route(active.route.id)
                .unwrap();
        }
        assert_eq!(state.update_active_route(), None);
    }

    #[tokio::test]
    async fn refresh_without_active_route_does_nothing() {
        let state = state();
        refresh(&state).await.unwrap();
        assert_eq!(*state.next_sync.read().unwrap(), 0);
        assert!(state.board.read().unwrap().fetched_at.is_none());
    }

    #[tokio::test]
    async fn refresh_without_credential_reports_on_the_board() {
        let state = state();
        state.set_location(Coordinate::new(37.8, -122.3));
        let err = refresh(&state).await.unwrap_err();
        assert!(matches!(err, TransitError::MissingCredential));
        let board = state.board.read().unwrap();
        assert_eq!(board.error.as_deref(), Some("API key not set"));
        assert_eq!(*state.last_successful_sync.read().unwrap(), 0);
    }

    /// Local StopMonitoring endpoint answering with one departure for the first `ok_answers`
    /// requests and with 500 after that.
    async fn stop_monitoring(ok_answers: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = axum::Router::new().route(
            "/StopMonitoring",
            axum::routing::get(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) >= ok_answers {
                        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
                    }
                    let departs = (Utc::now() + Duration::minutes(10)).to_rfc3339();
                    let payload = json!({"ServiceDelivery": {"StopMonitoringDelivery": {
                        "MonitoredStopVisit": [{"MonitoredVehicleJourney": {
                            "LineRef": "L",
                            "DestinationName": "From A",
                            "Monitored": true,
                            "MonitoredCall": {"ExpectedDepartureTime": departs}
                        }}]
                    }}});
                    (StatusCode::OK, payload.to_string())
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), hits)
    }

    fn one_station_route(id: &str, lat: f64, lon: f64) -> ConfiguredRoute {
        ConfiguredRoute::new(
            id.into(),
            "BA".into(),
            String::new(),
            Station::new(id, id, Some(Coordinate::new(lat, lon))),
            None,
        )
    }

    fn two_route_state(api_url: String) -> AppState {
        let mut settings = Settings::load(Box::new(MemoryStore::default()));
        settings.set_api_key("key").unwrap();
        settings.add_route(one_station_route("A", 0.0, 0.0)).unwrap();
        settings.add_route(one_station_route("B", 10.0, 10.0)).unwrap();
        AppState::new(settings, api_url, Client::new(), DirectionMatch::default())
    }

    fn shown(state: &AppState) -> DepartureBoard {
        let active = state.active_route();
        let board = state.board.read().unwrap();
        DepartureBoard::new(active.as_ref(), &board, Utc::now())
    }

    #[tokio::test]
    async fn departures_never_show_under_another_route() {
        let (api_url, _) = stop_monitoring(1).await;
        let state = two_route_state(api_url);

        state.set_location(Coordinate::new(0.0, 0.0));
        refresh(&state).await.unwrap();
        let board = shown(&state);
        assert_eq!(board.departures.len(), 1);
        assert_eq!(board.departures[0].destination, "From A");

        state.set_location(Coordinate::new(10.0, 10.0));
        assert!(state.board.read().unwrap().departures.is_empty());

        let err = refresh(&state).await.unwrap_err();
        assert!(matches!(err, TransitError::HttpError(500)));
        let board = shown(&state);
        assert_eq!(
            board.route.map(|route| route.departure_station.id),
            Some("B".to_string())
        );
        assert!(board.departures.is_empty());
        assert_eq!(board.error.as_deref(), Some("Server error: 500"));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_departures_of_the_same_route() {
        let (api_url, _) = stop_monitoring(1).await;
        let state = two_route_state(api_url);
        state.set_location(Coordinate::new(0.0, 0.0));
        refresh(&state).await.unwrap();
        assert!(refresh(&state).await.is_err());

        let board = shown(&state);
        assert_eq!(board.departures.len(), 1);
        assert_eq!(board.error.as_deref(), Some("Server error: 500"));
    }

    #[tokio::test]
    async fn refresh_if_needed_skips_recent_refreshes_of_the_same_route() {
        let (api_url, hits) = stop_monitoring(usize::MAX).await;
        let state = two_route_state(api_url);

        // Nothing active, nothing fetched
        assert!(!refresh_if_needed(&state).await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        state.set_location(Coordinate::new(0.0, 0.0));
        assert!(refresh_if_needed(&state).await.unwrap());
        assert!(!refresh_if_needed(&state).await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        state.set_location(Coordinate::new(10.0, 10.0));
        assert!(refresh_if_needed(&state).await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        {
            let mut last_refresh = state.last_refresh.write().unwrap();
            if let Some((_, at)) = last_refresh.as_mut() {
                *at -= Duration::seconds(REFRESH_THRESHOLD_SECONDS);
            }
        }
        assert!(refresh_if_needed(&state).await.unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
