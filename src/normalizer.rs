// Turns monitored stop visits into the short, sorted list of departures we display
use crate::model::{ActiveRoute, Departure};
use crate::siri_format::{MonitoredVehicleJourney, StopMonitoringResponse};
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use tracing::debug;

pub const MAX_DEPARTURES: usize = 5;
const DEFAULT_LINE_NAME: &str = "Train";

/// How a vehicle's live destination is compared with the station we're heading to.
///
/// Station names in a configured route rarely match the operator's headsigns exactly
/// ("Embarcadero" vs "SF / Embarcadero"), so the default accepts containment either way.
/// Either side being empty always passes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DirectionMatch {
    #[default]
    Containment,
    Exact,
    Off,
}

impl DirectionMatch {
    pub fn accepts(&self, destination: &str, target: &str) -> bool {
        let destination = destination.to_lowercase();
        let target = target.to_lowercase();
        if destination.is_empty() || target.is_empty() {
            return true;
        }
        match self {
            DirectionMatch::Containment => {
                destination.contains(&target) || target.contains(&destination)
            }
            DirectionMatch::Exact => destination == target,
            DirectionMatch::Off => true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DepartureFilter {
    /// Empty accepts every line
    pub line_id: String,
    /// Name of the station we're travelling towards, if the route has one
    pub direction_target: Option<String>,
    pub direction_match: DirectionMatch,
}

impl DepartureFilter {
    pub fn for_route(active: &ActiveRoute, direction_match: DirectionMatch) -> Self {
        Self {
            line_id: active.route.line_id.clone(),
            direction_target: active.arrival_station().map(|station| station.name.clone()),
            direction_match,
        }
    }
}

/// Upcoming departures, earliest first, at most [`MAX_DEPARTURES`].
///
/// A visit that fails any check is skipped on its own; the rest of the batch is kept.
/// Identical visits are not merged.
pub fn normalize(
    response: &StopMonitoringResponse,
    filter: &DepartureFilter,
    now: DateTime<Utc>,
) -> Vec<Departure> {
    let visits = response.visits();
    let mut departures: Vec<Departure> = visits
        .iter()
        .filter_map(|visit| departure(&visit.monitored_vehicle_journey, filter, now))
        .collect();
    debug!(
        "kept={} of visits={} before truncating",
        departures.len(),
        visits.len()
    );
    departures.sort_by_key(|departure| departure.departure_time);
    departures.truncate(MAX_DEPARTURES);
    departures
}

fn departure(
    journey: &MonitoredVehicleJourney,
    filter: &DepartureFilter,
    now: DateTime<Utc>,
) -> Option<Departure> {
    if !filter.line_id.is_empty() && journey.line_ref.as_deref() != Some(filter.line_id.as_str())
    {
        debug!("Skip line={:?}, want {}", journey.line_ref, filter.line_id);
        return None;
    }

    if let Some(target) = &filter.direction_target {
        let destination = journey.destination_name.as_deref().unwrap_or_default();
        if !filter.direction_match.accepts(destination, target) {
            debug!("Skip destination={destination}, heading to {target}");
            return None;
        }
    }

    let Some(raw) = journey
        .monitored_call
        .as_ref()
        .and_then(|call| call.best_timestamp())
    else {
        debug!("Skip visit without any call time, line={:?}", journey.line_ref);
        return None;
    };
    let Some(departure_time) = parse_timestamp(raw) else {
        debug!("Skip unparseable time={raw}");
        return None;
    };
    if departure_time <= now {
        return None;
    }

    let line_name = journey
        .published_line_name
        .clone()
        .or_else(|| journey.line_ref.clone())
        .unwrap_or_else(|| DEFAULT_LINE_NAME.to_string());
    let destination = journey
        .destination_name
        .clone()
        .or_else(|| filter.direction_target.clone())
        .unwrap_or_default();

    Some(Departure::new(
        line_name,
        destination,
        departure_time,
        journey.monitored.unwrap_or(false),
    ))
}

/// RFC 3339 with or without fractional seconds, then the compact `+hhmm` offset some feeds use.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
}
