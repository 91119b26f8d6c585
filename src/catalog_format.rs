// Stop and line listings. The same endpoint answers in one of two dialects:
//
//   A: {"Contents": {"dataObjects": {"ScheduledStopPoint" | "Line": [...]}}}
//   B: {"Siri": {"ServiceDelivery": {"DataObjectDelivery": {"dataObjects": {
//          "SiteFrame": {"stopPlaces": {"StopPlace": [...]}}}}}}}
//      {"Siri": ... {"ServiceFrame": {"lines": {"Line": [...]}}}}
//
// Every level is optional; a level of the wrong shape is treated as missing.
use crate::lenient::{invalid_as_none, lenient_f64, lenient_string, one_or_many};
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct StopsResponse {
    #[serde(rename = "Contents", default, deserialize_with = "invalid_as_none")]
    pub contents: Option<Contents<StopObjects>>,
    #[serde(rename = "Siri", default, deserialize_with = "invalid_as_none")]
    pub siri: Option<Siri<SiteFrameObjects>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
pub struct LinesResponse {
    #[serde(rename = "Contents", default, deserialize_with = "invalid_as_none")]
    pub contents: Option<Contents<LineObjects>>,
    #[serde(rename = "Siri", default, deserialize_with = "invalid_as_none")]
    pub siri: Option<Siri<ServiceFrameObjects>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Contents<T> {
    #[serde(rename = "dataObjects", default, deserialize_with = "invalid_as_none")]
    pub data_objects: Option<T>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct Siri<T> {
    #[serde(rename = "ServiceDelivery", default, deserialize_with = "invalid_as_none")]
    pub service_delivery: Option<SiriServiceDelivery<T>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct SiriServiceDelivery<T> {
    #[serde(rename = "DataObjectDelivery", default, deserialize_with = "invalid_as_none")]
    pub data_object_delivery: Option<Contents<T>>,
}

impl<T> Contents<T> {
    fn objects(&self) -> Option<&T> {
        self.data_objects.as_ref()
    }
}

impl<T> Siri<T> {
    fn objects(&self) -> Option<&T> {
        self.service_delivery
            .as_ref()?
            .data_object_delivery
            .as_ref()?
            .objects()
    }
}

impl StopsResponse {
    pub fn scheduled_stop_points(&self) -> &[ScheduledStopPoint] {
        self.contents
            .as_ref()
            .and_then(Contents::objects)
            .map(|objects| objects.scheduled_stop_point.as_slice())
            .unwrap_or_default()
    }

    pub fn stop_places(&self) -> &[StopPlace] {
        self.siri
            .as_ref()
            .and_then(Siri::objects)
            .and_then(|objects| objects.site_frame.as_ref())
            .and_then(|frame| frame.stop_places.as_ref())
            .map(|places| places.stop_place.as_slice())
            .unwrap_or_default()
    }
}

impl LinesResponse {
    pub fn content_lines(&self) -> &[LineRecord] {
        self.contents
            .as_ref()
            .and_then(Contents::objects)
            .map(|objects| objects.line.as_slice())
            .unwrap_or_default()
    }

    pub fn service_frame_lines(&self) -> &[LineRecord] {
        self.siri
            .as_ref()
            .and_then(Siri::objects)
            .and_then(|objects| objects.service_frame.as_ref())
            .and_then(|frame| frame.lines.as_ref())
            .map(|lines| lines.line.as_slice())
            .unwrap_or_default()
    }
}

// Dialect A, stops

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct StopObjects {
    #[serde(rename = "ScheduledStopPoint", default, deserialize_with = "one_or_many")]
    pub scheduled_stop_point: Vec<ScheduledStopPoint>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ScheduledStopPoint {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(rename = "Name", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(rename = "Location", default, deserialize_with = "invalid_as_none")]
    pub location: Option<Location>,
}

/// Decimal degrees, sent as strings
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Location {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
}

// Dialect B, stops

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SiteFrameObjects {
    #[serde(rename = "SiteFrame", default, deserialize_with = "invalid_as_none")]
    pub site_frame: Option<SiteFrame>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SiteFrame {
    #[serde(rename = "stopPlaces", default, deserialize_with = "invalid_as_none")]
    pub stop_places: Option<StopPlaces>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct StopPlaces {
    #[serde(rename = "StopPlace", default, deserialize_with = "one_or_many")]
    pub stop_place: Vec<StopPlace>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct StopPlace {
    #[serde(alias = "@id", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(rename = "Name", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(rename = "Centroid", default, deserialize_with = "invalid_as_none")]
    pub centroid: Option<Centroid>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Centroid {
    #[serde(rename = "Location", default, deserialize_with = "invalid_as_none")]
    pub location: Option<Location>,
}

// Lines, both dialects share the record shape

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LineObjects {
    #[serde(rename = "Line", default, deserialize_with = "one_or_many")]
    pub line: Vec<LineRecord>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ServiceFrameObjects {
    #[serde(rename = "ServiceFrame", default, deserialize_with = "invalid_as_none")]
    pub service_frame: Option<ServiceFrame>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ServiceFrame {
    #[serde(default, deserialize_with = "invalid_as_none")]
    pub lines: Option<LineObjects>,
}

/// Operators fill `Id` or `id`, occasionally both.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LineRecord {
    #[serde(rename = "Id", default, deserialize_with = "lenient_string")]
    pub upper_id: Option<String>,
    #[serde(rename = "id", default, deserialize_with = "lenient_string")]
    pub lower_id: Option<String>,
    #[serde(rename = "Name", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(rename = "PublicCode", default, deserialize_with = "lenient_string")]
    pub public_code: Option<String>,
}

impl LineRecord {
    pub fn id(&self) -> Option<&str> {
        [&self.upper_id, &self.lower_id]
            .into_iter()
            .filter_map(|id| id.as_deref())
            .find(|id| !id.is_empty())
    }
}
