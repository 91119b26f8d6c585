// Router setup
use crate::handlers;
use crate::server::state::AppState;
use axum::error_handling::HandleErrorLayer;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Router, http};
use http::HeaderValue;
use http::header::CACHE_CONTROL;
use std::time;
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::cors;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::error;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthy", get(handlers::healthy))
        .route("/location", put(handlers::put_location))
        .route("/active", get(handlers::active))
        .route("/departures", get(handlers::departures))
        .route("/departures.html", get(handlers::departures_html))
        .route("/refresh", post(handlers::refresh))
        .route(
            "/routes",
            get(handlers::list_routes).post(handlers::add_route),
        )
        .route(
            "/routes/{id}",
            put(handlers::update_route).delete(handlers::delete_route),
        )
        .route("/operators", get(handlers::operators))
        .route("/operators/{operator}", get(handlers::operator_catalog))
        .route("/operators/{operator}/stops", get(handlers::operator_stops))
        .route("/operators/{operator}/lines", get(handlers::operator_lines))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|_: BoxError| async {
                    error!("Timed out");
                    (StatusCode::REQUEST_TIMEOUT, "Timed out. Sorry!".to_string())
                }))
                // Upstream calls may take up to 30s on their own
                .layer(TimeoutLayer::new(time::Duration::from_secs(45)))
                .layer(
                    CorsLayer::new()
                        .allow_methods([
                            http::Method::GET,
                            http::Method::PUT,
                            http::Method::POST,
                            http::Method::DELETE,
                        ])
                        .allow_headers([http::header::CONTENT_TYPE])
                        .allow_origin(cors::Any),
                ),
        )
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::DirectionMatch;
    use crate::settings::Settings;
    use crate::settings::tests::{MemoryStore, route};
    use crate::transit_api;
    use serde_json::{Value, json};

    async fn serve(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = create_router(state);
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    fn state() -> AppState {
        let mut settings = Settings::load(Box::new(MemoryStore::default()));
        settings.add_route(route("commute")).unwrap();
        AppState::new(
            settings,
            transit_api::API_URL.to_string(),
            reqwest::Client::new(),
            DirectionMatch::default(),
        )
    }

    #[tokio::test]
    async fn location_selects_the_active_route() {
        let base = serve(state()).await;
        let client = reqwest::Client::new();

        let active: Value = client
            .get(format!("{base}/active"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(active, Value::Null);

        let response = client
            .put(format!("{base}/location"))
            .json(&json!({"lat": 37.7895, "lon": -122.4010}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let active: Value = response.json().await.unwrap();
        assert_eq!(active["is_reversed"], json!(true));
        assert_eq!(active["departure_station"]["id"], json!("MONT"));

        let response = client
            .put(format!("{base}/location"))
            .json(&json!({"lat": 91.0, "lon": 0.0}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn routes_can_be_added_and_removed() {
        let base = serve(state()).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/routes"))
            .json(&json!({
                "name": "gym",
                "operatorId": "CT",
                "originStation": {"id": "70011", "name": "San Francisco"}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let created: Value = response.json().await.unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let routes: Vec<Value> = client
            .get(format!("{base}/routes"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(routes.len(), 2);

        let response = client
            .put(format!("{base}/routes/{id}"))
            .json(&json!({
                "name": "climbing",
                "operatorId": "CT",
                "originStation": {"id": "70011", "name": "San Francisco"}
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let updated: Value = response.json().await.unwrap();
        assert_eq!(updated["id"], json!(id));
        assert_eq!(updated["name"], json!("climbing"));

        let response = client.delete(format!("{base}/routes/{id}")).send().await.unwrap();
        assert_eq!(response.status(), 204);
        let response = client.delete(format!("{base}/routes/{id}")).send().await.unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn catalog_requires_a_known_operator_and_a_key() {
        let base = serve(state()).await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("{base}/operators/XX/stops"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 404);

        let response = client
            .get(format!("{base}/operators/BA/lines"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 503);

        let operators: Vec<Value> = client
            .get(format!("{base}/operators"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(operators.len(), 7);
        assert_eq!(operators[0], json!({"id": "BA", "name": "BART"}));
    }

    #[tokio::test]
    async fn empty_board_renders() {
        let base = serve(state()).await;
        let response = reqwest::get(format!("{base}/departures.html")).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()[CACHE_CONTROL], "no-cache");
        assert!(response.text().await.unwrap().contains("Waiting for location"));

        let board: Value = reqwest::get(format!("{base}/departures"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(board["departures"], json!([]));

        let client = reqwest::Client::new();
        for url in [format!("{base}/refresh"), format!("{base}/refresh?force=true")] {
            let response = client.post(url).send().await.unwrap();
            assert_eq!(response.status(), 200);
        }
    }
}
