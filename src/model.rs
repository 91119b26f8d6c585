use chrono::{DateTime, Utc};
use clap::ValueEnum;
use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// WGS84 position in decimal degrees
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance in meters
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        Point::new(self.lon, self.lat).haversine_distance(&Point::new(other.lon, other.lat))
    }
}

/// A stop as the user or the operator's catalog knows it. Two stations are the same station
/// when their ids match.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
}

impl Station {
    pub fn new(id: impl Into<String>, name: impl Into<String>, coordinate: Option<Coordinate>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            coordinate,
        }
    }
}

impl PartialEq for Station {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Station {}

impl Hash for Station {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitLine {
    pub id: String,
    pub name: String,
}

impl TransitLine {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

impl PartialEq for TransitLine {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TransitLine {}

/// A commute the user set up: departures are looked up at whichever end is closest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfiguredRoute {
    pub id: Uuid,
    pub name: String,
    pub operator_id: String,
    /// Empty matches any line
    #[serde(default)]
    pub line_id: String,
    pub origin_station: Station,
    #[serde(default)]
    pub destination_station: Option<Station>,
}

impl ConfiguredRoute {
    pub fn new(
        name: String,
        operator_id: String,
        line_id: String,
        origin_station: Station,
        destination_station: Option<Station>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            operator_id,
            line_id,
            origin_station,
            destination_station,
        }
    }

    /// Origin first, then the destination if there is one, flagged with whether travelling
    /// from it reverses the route.
    pub fn endpoints(&self) -> impl Iterator<Item = (&Station, bool)> {
        std::iter::once((&self.origin_station, false))
            .chain(self.destination_station.iter().map(|station| (station, true)))
    }
}

/// The route nearest to the user, oriented so that `departure_station` is the close end.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveRoute {
    pub route: ConfiguredRoute,
    pub is_reversed: bool,
}

impl ActiveRoute {
    pub fn departure_station(&self) -> &Station {
        match (&self.route.destination_station, self.is_reversed) {
            (Some(destination), true) => destination,
            _ => &self.route.origin_station,
        }
    }

    pub fn arrival_station(&self) -> Option<&Station> {
        if self.is_reversed {
            Some(&self.route.origin_station)
        } else {
            self.route.destination_station.as_ref()
        }
    }

    pub fn display_name(&self) -> String {
        match self.arrival_station() {
            Some(arrival) => format!("{} → {}", self.departure_station().name, arrival.name),
            None => self.departure_station().name.clone(),
        }
    }
}

/// One upcoming vehicle at the departure station. Lives for a single fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct Departure {
    pub id: Uuid,
    pub line_name: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub is_real_time: bool,
}

impl Departure {
    pub fn new(
        line_name: String,
        destination: String,
        departure_time: DateTime<Utc>,
        is_real_time: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            line_name,
            destination,
            departure_time,
            is_real_time,
        }
    }

    /// Whole minutes left, rounded down, never negative.
    pub fn minutes_until(&self, now: DateTime<Utc>) -> i64 {
        (self.departure_time - now).num_seconds().max(0) / 60
    }

    pub fn time_string(&self, now: DateTime<Utc>) -> String {
        match self.minutes_until(now) {
            0 => "Now".to_string(),
            1 => "1 min".to_string(),
            minutes => format!("{minutes} min"),
        }
    }
}

/// The agencies the 511.org feed is queried for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Operator {
    #[value(alias = "BA")]
    Bart,
    #[value(alias = "CT")]
    Caltrain,
    #[value(alias = "SF")]
    Muni,
    #[value(alias = "SC")]
    Vta,
    #[value(alias = "AC")]
    AcTransit,
    #[value(alias = "SM")]
    Samtrans,
    #[value(alias = "GG")]
    GoldenGate,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Operator::Bart,
        Operator::Caltrain,
        Operator::Muni,
        Operator::Vta,
        Operator::AcTransit,
        Operator::Samtrans,
        Operator::GoldenGate,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Operator::Bart => "BA",
            Operator::Caltrain => "CT",
            Operator::Muni => "SF",
            Operator::Vta => "SC",
            Operator::AcTransit => "AC",
            Operator::Samtrans => "SM",
            Operator::GoldenGate => "GG",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Operator::Bart => "BART",
            Operator::Caltrain => "Caltrain",
            Operator::Muni => "SF Muni",
            Operator::Vta => "VTA",
            Operator::AcTransit => "AC Transit",
            Operator::Samtrans => "SamTrans",
            Operator::GoldenGate => "Golden Gate Transit",
        }
    }

    pub fn from_id(id: &str) -> Option<Operator> {
        Operator::ALL
            .into_iter()
            .find(|operator| operator.id().eq_ignore_ascii_case(id))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 8, 0, 0).unwrap()
    }

    fn route(destination: Option<Station>) -> ConfiguredRoute {
        ConfiguredRoute::new(
            "Commute".into(),
            "BA".into(),
            String::new(),
            Station::new("A", "Home", Some(Coordinate::new(0.0, 0.0))),
            destination,
        )
    }

    #[test]
    fn minutes_round_down_and_clamp_at_zero() {
        let at = |seconds| Departure::new("L".into(), "D".into(), now() + Duration::seconds(seconds), true);
        assert_eq!(at(59).minutes_until(now()), 0);
        assert_eq!(at(60).minutes_until(now()), 1);
        assert_eq!(at(179).minutes_until(now()), 2);
        assert_eq!(at(-300).minutes_until(now()), 0);
    }

    #[test]
    fn minutes_are_recomputed_for_each_reading() {
        let departure = Departure::new("L".into(), "D".into(), now() + Duration::minutes(10), false);
        assert_eq!(departure.time_string(now()), "10 min");
        assert_eq!(departure.time_string(now() + Duration::minutes(9)), "1 min");
        assert_eq!(departure.time_string(now() + Duration::seconds(570)), "Now");
    }

    #[test]
    fn reversed_route_swaps_stations() {
        let active = ActiveRoute {
            route: route(Some(Station::new("B", "Work", None))),
            is_reversed: true,
        };
        assert_eq!(active.departure_station().id, "B");
        assert_eq!(active.arrival_station().map(|s| s.id.as_str()), Some("A"));
        assert_eq!(active.display_name(), "Work → Home");
    }

    #[test]
    fn origin_only_route_has_no_arrival() {
        let active = ActiveRoute {
            route: route(None),
            is_reversed: false,
        };
        assert_eq!(active.departure_station().id, "A");
        assert_eq!(active.arrival_station(), None);
        assert_eq!(active.display_name(), "Home");
    }

    #[test]
    fn stations_are_identified_by_id() {
        let a = Station::new("A", "Home", None);
        let b = Station::new("A", "Renamed", Some(Coordinate::new(1.0, 1.0)));
        assert_eq!(a, b);
    }

    #[test]
    fn line_display_name_falls_back_to_id() {
        let line = TransitLine {
            id: "RED".into(),
            name: String::new(),
        };
        assert_eq!(line.display_name(), "RED");
    }

    #[test]
    fn operators_resolve_from_feed_ids() {
        assert_eq!(Operator::from_id("ba"), Some(Operator::Bart));
        assert_eq!(Operator::from_id("GG"), Some(Operator::GoldenGate));
        assert_eq!(Operator::from_id("XX"), None);
    }

    #[test]
    fn routes_survive_a_json_round_trip_without_destination() {
        let original = route(None);
        let json = serde_json::to_string(&vec![original.clone()]).unwrap();
        let decoded: Vec<ConfiguredRoute> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, vec![original]);
    }
}
