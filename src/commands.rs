// One-shot commands that print to stdout and exit
use crate::api::local_time;
use crate::cli::RouteCommands;
use crate::model::{ConfiguredRoute, Coordinate, Operator, Station};
use crate::normalizer::DirectionMatch;
use crate::resolver;
use crate::settings::{FileStore, Settings};
use crate::transit_api::{self, Config};
use anyhow::{Context, bail};
use chrono::Utc;
use std::path::Path;
use tracing::info;

pub fn load_settings(path: &str) -> Settings {
    Settings::load(Box::new(FileStore::open(Path::new(path))))
}

fn config(settings: &Settings, api_url: &str) -> anyhow::Result<Config> {
    Ok(Config::from_settings(
        settings,
        api_url,
        transit_api::http_client()?,
    )?)
}

pub async fn departures(
    settings: &Settings,
    api_url: &str,
    location: Coordinate,
    direction_match: DirectionMatch,
) -> anyhow::Result<()> {
    if !location.is_valid() {
        bail!("{}, {} is not a valid position", location.lat, location.lon);
    }
    let Some(active) = resolver::resolve(Some(location), settings.routes()) else {
        println!("No configured route has a station with a known position");
        return Ok(());
    };
    let config = config(settings, api_url)?;
    let departures = transit_api::fetch_departures(&config, &active, direction_match).await?;

    println!("{}", active.display_name());
    if departures.is_empty() {
        println!("  No upcoming departures");
    }
    let now = Utc::now();
    for departure in departures {
        println!(
            "  {:>6}  {}  {} to {}{}",
            departure.time_string(now),
            local_time(departure.departure_time),
            departure.line_name,
            departure.destination,
            if departure.is_real_time { "" } else { " (scheduled)" }
        );
    }
    Ok(())
}

pub async fn stops(settings: &Settings, api_url: &str, operator: Operator) -> anyhow::Result<()> {
    let config = config(settings, api_url)?;
    info!("Fetching stops of {operator}");
    let stations = transit_api::fetch_stations(&config, operator.id()).await?;
    for station in stations {
        match station.coordinate {
            Some(c) => println!("{}\t{}\t{:.6}, {:.6}", station.id, station.name, c.lat, c.lon),
            None => println!("{}\t{}", station.id, station.name),
        }
    }
    Ok(())
}

pub async fn lines(settings: &Settings, api_url: &str, operator: Operator) -> anyhow::Result<()> {
    let config = config(settings, api_url)?;
    info!("Fetching lines of {operator}");
    for line in transit_api::fetch_lines(&config, operator.id()).await? {
        println!("{}\t{}", line.id, line.display_name());
    }
    Ok(())
}

fn station(
    id: String,
    name: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
) -> anyhow::Result<Station> {
    let coordinate = match (lat, lon) {
        (Some(lat), Some(lon)) => {
            let coordinate = Coordinate::new(lat, lon);
            if !coordinate.is_valid() {
                bail!("{lat}, {lon} is not a valid position for {id}");
            }
            Some(coordinate)
        }
        _ => None,
    };
    let name = name.unwrap_or_else(|| id.clone());
    Ok(Station::new(id, name, coordinate))
}

pub fn routes(settings: &mut Settings, command: RouteCommands) -> anyhow::Result<()> {
    match command {
        RouteCommands::List => {
            for route in settings.routes() {
                let destination = route
                    .destination_station
                    .as_ref()
                    .map(|s| format!(" → {}", s.name))
                    .unwrap_or_default();
                println!(
                    "{}\t{}\t{} {}{}",
                    route.id, route.name, route.operator_id, route.origin_station.name, destination
                );
            }
        }
        RouteCommands::Add {
            name,
            operator,
            line,
            from,
            from_name,
            from_lat,
            from_lon,
            to,
            to_name,
            to_lat,
            to_lon,
        } => {
            let origin = station(from, from_name, from_lat, from_lon)?;
            let destination = to
                .map(|to| station(to, to_name, to_lat, to_lon))
                .transpose()?;
            let route = ConfiguredRoute::new(
                name,
                operator.id().to_string(),
                line,
                origin,
                destination,
            );
            println!("{}", route.id);
            settings.add_route(route)?;
        }
        RouteCommands::Remove { id } => {
            let removed = settings
                .remove_route(id)?
                .with_context(|| format!("No route with id {id}"))?;
            println!("Removed {}", removed.name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::tests::MemoryStore;

    #[test]
    fn routes_are_added_and_removed_from_the_command_line() {
        let mut settings = Settings::load(Box::new(MemoryStore::default()));
        routes(
            &mut settings,
            RouteCommands::Add {
                name: "commute".into(),
                operator: Operator::Bart,
                line: String::new(),
                from: "12TH".into(),
                from_name: Some("12th St".into()),
                from_lat: Some(37.8037),
                from_lon: Some(-122.2714),
                to: Some("MONT".into()),
                to_name: None,
                to_lat: None,
                to_lon: None,
            },
        )
        .unwrap();

        let route = settings.routes()[0].clone();
        assert_eq!(route.operator_id, "BA");
        let destination = route.destination_station.unwrap();
        assert_eq!(destination.name, "MONT");
        assert_eq!(destination.coordinate, None);

        routes(&mut settings, RouteCommands::Remove { id: route.id }).unwrap();
        assert!(settings.routes().is_empty());
        assert!(routes(&mut settings, RouteCommands::Remove { id: route.id }).is_err());
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        assert!(station("A".into(), None, Some(100.0), Some(0.0)).is_err());
        assert!(station("A".into(), None, Some(10.0), None).unwrap().coordinate.is_none());
    }
}
