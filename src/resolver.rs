// Picks which configured route the user is most likely about to ride
use crate::model::{ActiveRoute, ConfiguredRoute, Coordinate};

/// The route with the station nearest to `current`, oriented to depart from that station.
///
/// Without a location fix there is nothing to resolve, and stations without coordinates never
/// compete. Candidates are visited route by route, origin before destination, and only a
/// strictly shorter distance replaces the current best, so the first of several equidistant
/// stations wins.
pub fn resolve(current: Option<Coordinate>, routes: &[ConfiguredRoute]) -> Option<ActiveRoute> {
    let current = current?;
    let mut nearest: Option<(&ConfiguredRoute, bool)> = None;
    let mut nearest_distance = f64::INFINITY;

    for route in routes {
        for (station, is_reversed) in route.endpoints() {
            let Some(coordinate) = station.coordinate else {
                continue;
            };
            let distance = current.distance_to(&coordinate);
            if distance < nearest_distance {
                nearest_distance = distance;
                nearest = Some((route, is_reversed));
            }
        }
    }

    nearest.map(|(route, is_reversed)| ActiveRoute {
        route: route.clone(),
        is_reversed,
    })
}
