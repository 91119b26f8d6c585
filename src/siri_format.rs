// The SIRI StopMonitoring shape returned by the departures endpoint. Only the fields we project
// into departures are modelled. Operators disagree on whether a delivery or a visit is a bare
// object or a one-element array, so both nesting levels go through `one_or_many`.
use crate::lenient::{invalid_as_none, lenient_bool, lenient_string, one_or_many};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StopMonitoringResponse {
    pub service_delivery: ServiceDelivery,
}

impl StopMonitoringResponse {
    /// Visits of the first delivery. A response without one has no departures.
    pub fn visits(&self) -> &[MonitoredStopVisit] {
        self.service_delivery
            .stop_monitoring_delivery
            .first()
            .map(|delivery| delivery.monitored_stop_visit.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceDelivery {
    #[serde(default, deserialize_with = "one_or_many")]
    pub stop_monitoring_delivery: Vec<StopMonitoringDelivery>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct StopMonitoringDelivery {
    #[serde(default, deserialize_with = "one_or_many")]
    pub monitored_stop_visit: Vec<MonitoredStopVisit>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MonitoredStopVisit {
    pub monitored_vehicle_journey: MonitoredVehicleJourney,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct MonitoredVehicleJourney {
    /// Matched against a route's line filter, e.g. `BLUE` or `14R`
    #[serde(default, deserialize_with = "lenient_string")]
    pub line_ref: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub published_line_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub destination_name: Option<String>,
    /// True when the times below come from a tracked vehicle rather than the timetable
    #[serde(default, deserialize_with = "lenient_bool")]
    pub monitored: Option<bool>,
    #[serde(default, deserialize_with = "invalid_as_none")]
    pub monitored_call: Option<MonitoredCall>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct MonitoredCall {
    #[serde(default, deserialize_with = "lenient_string")]
    pub expected_departure_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub aimed_departure_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub expected_arrival_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub aimed_arrival_time: Option<String>,
}

impl MonitoredCall {
    /// Best available timestamp: expected before aimed, departure before arrival.
    pub fn best_timestamp(&self) -> Option<&str> {
        [
            &self.expected_departure_time,
            &self.aimed_departure_time,
            &self.expected_arrival_time,
            &self.aimed_arrival_time,
        ]
        .into_iter()
        .filter_map(|candidate| candidate.as_deref())
        .find(|candidate| !candidate.is_empty())
    }
}
