use crate::catalog::{build_lines, build_stations};
use crate::decode::{decode_departures, decode_lines, decode_stops};
use crate::error::{Result, TransitError};
use crate::model::{ActiveRoute, Departure, Station, TransitLine};
use crate::normalizer::{DepartureFilter, DirectionMatch, normalize};
use crate::settings::Settings;
use chrono::Utc;
use reqwest::{Client, ClientBuilder, StatusCode};
use std::time;
use tracing::{info, instrument};

pub const API_URL: &str = "https://api.511.org/transit";

pub struct Config {
    api_key: String,
    api_url: String,
    client: Client,
}

impl Config {
    pub fn new(api_key: String, api_url: String, client: Client) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(TransitError::MissingCredential);
        }
        Ok(Self {
            api_key,
            api_url,
            client,
        })
    }

    pub fn from_settings(settings: &Settings, api_url: &str, client: Client) -> Result<Self> {
        Self::new(settings.api_key().to_string(), api_url.to_string(), client)
    }
}

/// The caller's deadline for a single attempt; nothing is retried.
pub fn http_client() -> Result<Client> {
    Ok(ClientBuilder::default()
        .connect_timeout(time::Duration::from_millis(1_000))
        .timeout(time::Duration::from_millis(30_000))
        .build()?)
}

#[instrument(name = "fetch_511", skip(config, query), fields(status = tracing::field::Empty))]
async fn fetch(config: &Config, endpoint: &str, query: &[(&str, &str)]) -> Result<Vec<u8>> {
    let url = format!("{}/{endpoint}", config.api_url.trim_end_matches('/'));
    info!("Poll {url} with {query:?}");
    let response = config
        .client
        .get(url.as_str())
        .query(&[("api_key", config.api_key.as_str())])
        .query(query)
        .query(&[("format", "json")])
        .header("Accept", "application/json")
        .send()
        .await?;
    let status = response.status();
    tracing::Span::current().record("status", status.as_u16());
    if status != StatusCode::OK {
        return Err(TransitError::HttpError(status.as_u16()));
    }
    Ok(response.bytes().await?.to_vec())
}

pub async fn fetch_departures(
    config: &Config,
    active: &ActiveRoute,
    direction_match: DirectionMatch,
) -> Result<Vec<Departure>> {
    let stop = active.departure_station();
    let bytes = fetch(
        config,
        "StopMonitoring",
        &[
            ("agency", active.route.operator_id.as_str()),
            ("stopCode", stop.id.as_str()),
        ],
    )
    .await?;
    let response = decode_departures(&bytes)?;
    let filter = DepartureFilter::for_route(active, direction_match);
    Ok(normalize(&response, &filter, Utc::now()))
}

pub async fn fetch_stations(config: &Config, operator_id: &str) -> Result<Vec<Station>> {
    let bytes = fetch(config, "stops", &[("operator_id", operator_id)]).await?;
    build_stations(&decode_stops(&bytes)?)
}

pub async fn fetch_lines(config: &Config, operator_id: &str) -> Result<Vec<TransitLine>> {
    let bytes = fetch(config, "lines", &[("operator_id", operator_id)]).await?;
    Ok(build_lines(&decode_lines(&bytes)?))
}

/// Both pickers for the route editor, fetched side by side.
pub async fn fetch_catalog(
    config: &Config,
    operator_id: &str,
) -> (Result<Vec<Station>>, Result<Vec<TransitLine>>) {
    tokio::join!(
        fetch_stations(config, operator_id),
        fetch_lines(config, operator_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::tests::MemoryStore;

    #[test]
    fn missing_credential_is_reported_before_any_request() {
        let client = Client::new();
        assert!(matches!(
            Config::new("  ".into(), API_URL.into(), client.clone()),
            Err(TransitError::MissingCredential)
        ));
        let settings = Settings::load(Box::new(MemoryStore::default()));
        assert!(matches!(
            Config::from_settings(&settings, API_URL, client),
            Err(TransitError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn non_ok_status_is_an_http_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new().route(
            "/StopMonitoring",
            axum::routing::get(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = Config::new("key".into(), format!("http://{addr}/"), Client::new()).unwrap();
        let err = fetch(&config, "StopMonitoring", &[]).await.unwrap_err();
        assert!(matches!(err, TransitError::HttpError(401)));
    }

    #[tokio::test]
    async fn stops_and_lines_are_fetched_and_built() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = axum::Router::new()
            .route(
                "/stops",
                axum::routing::get(|| async {
                    "\u{feff}{\"Contents\": {\"dataObjects\": {\"ScheduledStopPoint\": {\"id\": \"70011\", \"Name\": \"San Francisco\"}}}}"
                }),
            )
            .route("/lines", axum::routing::get(|| async { "{\"Contents\": {}}" }));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = Config::new("key".into(), format!("http://{addr}"), Client::new()).unwrap();
        let (stations, lines) = fetch_catalog(&config, "CT").await;
        assert_eq!(stations.unwrap()[0].id, "70011");
        assert!(lines.unwrap().is_empty());
    }
}
