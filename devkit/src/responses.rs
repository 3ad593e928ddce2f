/*!
Builders de réponses co2signal

Construit des corps JSON conformes à l'API (réponse `ok`, erreur de token,
quota dépassé) et permet d'en retirer des champs pour tester le parser.
*/

use serde_json::{json, Map, Value};

pub const SAMPLE_DATETIME: &str = "2021-10-01T20:00:00.000Z";

/// Fluent builder for an `ok` latest-reading response.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    country_code: String,
    datetime: String,
    carbon_intensity: Value,
    fossil_fuel_percentage: Option<Value>,
    removed: Vec<String>,
}

impl ResponseBuilder {
    pub fn ok(country_code: &str) -> Self {
        Self {
            country_code: country_code.to_string(),
            datetime: SAMPLE_DATETIME.to_string(),
            carbon_intensity: json!(100),
            fossil_fuel_percentage: None,
            removed: Vec::new(),
        }
    }

    /// The France sample from the co2signal documentation.
    pub fn france_sample() -> Value {
        Self::ok("FR")
            .carbon_intensity(38.0)
            .fossil_fuel_percentage(3.5)
            .build()
    }

    pub fn datetime(mut self, datetime: &str) -> Self {
        self.datetime = datetime.to_string();
        self
    }

    /// Datetime of the current wall clock, ISO format.
    pub fn now(self) -> Self {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        self.datetime(&now)
    }

    pub fn carbon_intensity(mut self, value: f64) -> Self {
        // 38.0 doit sortir "38" comme dans les réponses réelles
        self.carbon_intensity = if value.fract() == 0.0 && value.abs() < 1e15 {
            json!(value as i64)
        } else {
            json!(value)
        };
        self
    }

    pub fn fossil_fuel_percentage(mut self, value: f64) -> Self {
        self.fossil_fuel_percentage = Some(json!(value));
        self
    }

    /// Removes a field; `data.x` addresses fields of the nested data object.
    pub fn without(mut self, field: &str) -> Self {
        self.removed.push(field.to_string());
        self
    }

    pub fn build(&self) -> Value {
        let mut data = Map::new();
        data.insert("datetime".into(), Value::String(self.datetime.clone()));
        data.insert("carbonIntensity".into(), self.carbon_intensity.clone());
        if let Some(fossil) = &self.fossil_fuel_percentage {
            data.insert("fossilFuelPercentage".into(), fossil.clone());
        }

        let mut body = json!({
            "_disclaimer": "This data is the exclusive property of Tomorrow and/or related parties.",
            "status": "ok",
            "countryCode": self.country_code,
            "data": Value::Object(data),
            "units": {"carbonIntensity": "gCO2eq/kWh"}
        });

        for field in &self.removed {
            remove_path(&mut body, field);
        }
        body
    }
}

/// Explicit API error, e.g. an invalid token or zone.
pub fn api_error(message: &str) -> Value {
    json!({"status": "error", "message": message})
}

/// Quota response: no `status` field, only a message.
pub fn quota_exceeded() -> Value {
    json!({"message": "API rate limit exceeded"})
}

fn remove_path(value: &mut Value, path: &str) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(last) = parts.pop() else { return };

    let mut current = value;
    for part in parts {
        match current.get_mut(part) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Value::Object(obj) = current {
        obj.remove(last);
    }
}
