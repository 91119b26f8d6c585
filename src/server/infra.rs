// Infrastructure concerns: error handling, signals, response types
use crate::api::DeparturesPage;
use crate::error::TransitError;
use askama::Template;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::signal;
use tokio::sync::watch::Sender;
use tracing::{error, info, warn};

pub struct WebappError {
    inner: anyhow::Error,
}

impl WebappError {
    fn status(&self) -> StatusCode {
        match self.inner.downcast_ref::<TransitError>() {
            Some(TransitError::MissingCredential) => StatusCode::SERVICE_UNAVAILABLE,
            Some(TransitError::NoStopsFound) => StatusCode::NOT_FOUND,
            Some(
                TransitError::HttpError(_)
                | TransitError::InvalidResponse(_)
                | TransitError::Network(_),
            ) => StatusCode::BAD_GATEWAY,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebappError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Error: {:?}", self.inner);
            return (status, "Internal Server Error").into_response();
        }
        warn!("Upstream problem: {}", self.inner);
        (status, self.inner.to_string()).into_response()
    }
}

impl<E> From<E> for WebappError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self { inner: err.into() }
    }
}

const TEMPLATE_ERROR_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Error - Leave</title>
    <style>
        body { font-family: sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #f5f5f5; }
        .error { background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 8px rgba(0,0,0,0.1); text-align: center; }
        h1 { color: #d32f2f; margin-bottom: 20px; }
        p { color: #666; }
        a { color: #667eea; text-decoration: none; }
    </style>
</head>
<body>
    <div class="error">
        <h1>Something went wrong</h1>
        <p>The departure board could not be shown.</p>
        <p>Try the <a href="/departures">JSON API</a> instead.</p>
    </div>
</body>
</html>"#;

impl IntoResponse for DeparturesPage {
    fn into_response(self) -> Response {
        match self.render() {
            Ok(html) => axum::response::Html(html).into_response(),
            Err(err) => {
                error!("Unable to render departures: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    axum::response::Html(TEMPLATE_ERROR_HTML),
                )
                    .into_response()
            }
        }
    }
}

pub async fn shutdown_signal(terminate_jobs: Sender<bool>) {
    let interrupt = async {
        signal::ctrl_c()
            .await
            .expect("Unable to set signal handler for Ctrl+C");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {
            info!("Received Ctrl+C signal");
            terminate_jobs.send(true).ok();
        },
        _ = terminate => {
            info!("Received terminate signal");
            terminate_jobs.send(true).ok();
        },
    }
}
