// Entry points from raw response bytes to the vendor payload types
use crate::catalog_format::{LinesResponse, StopsResponse};
use crate::error::Result;
use crate::siri_format::StopMonitoringResponse;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Some 511 responses start with a byte-order marker that JSON parsers reject.
pub fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes)
}

pub fn decode_departures(bytes: &[u8]) -> Result<StopMonitoringResponse> {
    Ok(serde_json::from_slice(strip_bom(bytes))?)
}

pub fn decode_stops(bytes: &[u8]) -> Result<StopsResponse> {
    Ok(serde_json::from_slice(strip_bom(bytes))?)
}

pub fn decode_lines(bytes: &[u8]) -> Result<LinesResponse> {
    Ok(serde_json::from_slice(strip_bom(bytes))?)
}
