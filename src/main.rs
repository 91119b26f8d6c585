use crate::cli::{Commands, Leave};
use crate::model::Coordinate;
use crate::server::infra;
use crate::server::state::{self, AppState};
use clap::Parser;
use tracing::info;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod catalog;
mod catalog_format;
mod cli;
mod commands;
mod decode;
mod error;
mod handlers;
mod lenient;
mod model;
mod normalizer;
mod resolver;
mod routes;
mod server;
mod settings;
mod siri_format;
mod transit_api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE),
        )
        .with(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Leave::parse();
    match args.command {
        Commands::Serve {
            shared_options,
            port,
            fetch_interval_seconds,
            direction_match,
        } => {
            let settings = commands::load_settings(&shared_options.settings);
            if !settings.has_valid_configuration() {
                info!("Add an API key and a route before departures can be shown");
            }
            let app_state = AppState::new(
                settings,
                shared_options.api_url,
                transit_api::http_client()?,
                direction_match,
            );
            let app = routes::create_router(app_state.clone());

            let addr = format!("0.0.0.0:{}", port);
            info!("Listening on {addr}");

            let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
            let (send_shutdown, recv_shutdown) = tokio::sync::watch::channel(false);
            let maybe_task = state::set_up_fetch_job(
                Some(fetch_interval_seconds).filter(|seconds| *seconds > 0),
                recv_shutdown,
                app_state,
            );

            axum::serve(listener, app)
                .with_graceful_shutdown(infra::shutdown_signal(send_shutdown))
                .await?;

            if let Some(task) = maybe_task {
                task.await?;
            }
        }
        Commands::Departures {
            shared_options,
            lat,
            lon,
            direction_match,
        } => {
            let settings = commands::load_settings(&shared_options.settings);
            commands::departures(
                &settings,
                &shared_options.api_url,
                Coordinate::new(lat, lon),
                direction_match,
            )
            .await?;
        }
        Commands::Stops {
            shared_options,
            operator,
        } => {
            let settings = commands::load_settings(&shared_options.settings);
            commands::stops(&settings, &shared_options.api_url, operator).await?;
        }
        Commands::Lines {
            shared_options,
            operator,
        } => {
            let settings = commands::load_settings(&shared_options.settings);
            commands::lines(&settings, &shared_options.api_url, operator).await?;
        }
        Commands::Routes {
            shared_options,
            command,
        } => {
            let mut settings = commands::load_settings(&shared_options.settings);
            commands::routes(&mut settings, command)?;
        }
        Commands::SetKey {
            shared_options,
            key,
        } => {
            let mut settings = commands::load_settings(&shared_options.settings);
            settings.set_api_key(&key)?;
            info!("API key stored in {}", shared_options.settings);
        }
        Commands::Clear { shared_options } => {
            let mut settings = commands::load_settings(&shared_options.settings);
            settings.clear_all()?;
            info!("Cleared {}", shared_options.settings);
        }
    }

    info!("Terminating");
    Ok(())
}
