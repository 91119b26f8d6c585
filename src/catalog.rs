// Station and line pickers for building new routes
use crate::catalog_format::{Location, LineRecord, LinesResponse, StopsResponse};
use crate::error::{Result, TransitError};
use crate::model::{Coordinate, Station, TransitLine};

/// Stations sorted by name. Dialect A is preferred; dialect B is only consulted when A holds
/// no usable stop. Entries without an id or a name are skipped.
pub fn build_stations(response: &StopsResponse) -> Result<Vec<Station>> {
    let mut stations: Vec<Station> = response
        .scheduled_stop_points()
        .iter()
        .filter_map(|point| station(
                point.id.as_deref(),
                point.name.as_deref(),
                point.location.as_ref(),
            ))
        .collect();

    if stations.is_empty() {
        stations = response
            .stop_places()
            .iter()
            .filter_map(|place| {
                let location = place.centroid.as_ref().and_then(|c| c.location.as_ref());
                station(place.id.as_deref(), place.name.as_deref(), location)
            })
            .collect();
    }

    if stations.is_empty() {
        return Err(TransitError::NoStopsFound);
    }
    stations.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(stations)
}

/// Lines sorted by display name. An operator without lines is fine: the line filter is
/// optional.
pub fn build_lines(response: &LinesResponse) -> Vec<TransitLine> {
    let mut lines: Vec<TransitLine> = response.content_lines().iter().filter_map(line).collect();
    if lines.is_empty() {
        lines = response
            .service_frame_lines()
            .iter()
            .filter_map(line)
            .collect();
    }
    lines.sort_by(|a, b| a.display_name().cmp(b.display_name()));
    lines
}

fn station(id: Option<&str>, name: Option<&str>, location: Option<&Location>) -> Option<Station> {
    let id = id.filter(|id| !id.is_empty())?;
    let name = name.filter(|name| !name.is_empty())?;
    let coordinate = location.and_then(|location| {
        Some(Coordinate::new(location.latitude?, location.longitude?))
    });
    Some(Station::new(id, name, coordinate))
}

fn line(record: &LineRecord) -> Option<TransitLine> {
    let id = record.id()?.to_string();
    let name = [&record.name, &record.public_code]
        .into_iter()
        .filter_map(|name| name.as_deref())
        .find(|name| !name.is_empty())
        .unwrap_or_default()
        .to_string();
    Some(TransitLine { id, name })
}
