//! Classification and normalisation of co2signal responses.
//!
//! A well-formed `ok` response becomes a [`NormalizedReading`]; an API-level
//! error (a non-`ok` status, or no status at all) is reported as
//! [`ParsedResponse::NonData`]; an `ok` response missing required fields is a
//! [`ParseError`].
//!
//! ```text
//! {"status":"ok","countryCode":"FR",
//!  "data":{"datetime":"2021-10-01T20:00:00.000Z","carbonIntensity":38,"fossilFuelPercentage":3.5},
//!  "units":{"carbonIntensity":"gCO2eq/kWh"}}
//! ```

use crate::api::RawResponse;
use crate::error::ParseError;
use crate::registry::DataCenter;
use serde_json::Value;

/// Unit of every carbon intensity the service reports.
pub const INTENSITY_UNIT: &str = "gCO2eq/kWh";

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedReading {
    /// Local clock at collection time, epoch seconds.
    pub collected_at: i64,
    /// Timestamp reported by the API.
    pub zone_datetime: String,
    pub status: String,
    pub zone_code: String,
    pub carbon_intensity: f64,
    pub intensity_unit: String,
    pub fossil_fuel_percentage: Option<f64>,
}

impl NormalizedReading {
    /// Row for the zone series.
    pub fn zone_row(&self) -> Vec<String> {
        vec![
            self.collected_at.to_string(),
            self.zone_datetime.clone(),
            self.status.clone(),
            self.zone_code.clone(),
            self.carbon_intensity.to_string(),
            self.intensity_unit.clone(),
            self.fossil_fuel_percentage
                .map(|p| p.to_string())
                .unwrap_or_default(),
        ]
    }

    /// Row attributing this reading to a data center located in the zone.
    pub fn data_center_row(&self, dc: &DataCenter) -> Vec<String> {
        vec![
            self.collected_at.to_string(),
            self.zone_datetime.clone(),
            self.status.clone(),
            dc.provider.clone(),
            dc.code.clone(),
            dc.country_code.clone(),
            self.carbon_intensity.to_string(),
            self.intensity_unit.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Data(NormalizedReading),
    /// The service answered with an error instead of a reading.
    NonData { message: String },
}

/// Parses `raw`, stamping the reading with the current local time.
pub fn parse(raw: &RawResponse) -> Result<ParsedResponse, ParseError> {
    parse_at(raw, chrono::Utc::now().timestamp())
}

pub fn parse_at(raw: &RawResponse, collected_at: i64) -> Result<ParsedResponse, ParseError> {
    match raw.body.get("status") {
        Some(Value::String(status)) if status == "ok" => {
            parse_reading(raw, status, collected_at).map(ParsedResponse::Data)
        }
        _ => Ok(ParsedResponse::NonData {
            message: api_message(&raw.body),
        }),
    }
}

fn parse_reading(
    raw: &RawResponse,
    status: &str,
    collected_at: i64,
) -> Result<NormalizedReading, ParseError> {
    let data = raw
        .body
        .get("data")
        .and_then(Value::as_object)
        .ok_or(ParseError::MissingData)?;

    let zone_datetime = data
        .get("datetime")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingField("datetime"))?;
    let carbon_intensity = data
        .get("carbonIntensity")
        .and_then(Value::as_f64)
        .ok_or(ParseError::MissingField("carbonIntensity"))?;

    let fossil_fuel_percentage = match data.get("fossilFuelPercentage") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            value
                .as_f64()
                .ok_or(ParseError::MissingField("fossilFuelPercentage"))?,
        ),
    };

    let zone_code = raw
        .body
        .get("countryCode")
        .and_then(Value::as_str)
        .unwrap_or(&raw.zone);

    Ok(NormalizedReading {
        collected_at,
        zone_datetime: zone_datetime.to_string(),
        status: status.to_string(),
        zone_code: zone_code.to_string(),
        carbon_intensity,
        intensity_unit: INTENSITY_UNIT.to_string(),
        fossil_fuel_percentage,
    })
}

fn api_message(body: &Value) -> String {
    match body.get("message") {
        Some(Value::String(message)) => message.clone(),
        _ => body.to_string(),
    }
}
