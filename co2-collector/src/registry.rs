/**
 * REGISTRY - Zones et data centers à surveiller
 *
 * RÔLE : Liste ordonnée des zones (codes pays / réseaux électriques) à interroger,
 * et rattachement de chaque data center cloud à exactement une zone.
 *
 * FONCTIONNEMENT :
 * - Les zones sont dérivées des `country_code` distincts du fichier de régions
 * - Ordre d'itération = ordre de première apparition dans le fichier
 * - Cache de la dernière réponse brute par zone (introspection / logs uniquement)
 */

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

/// Cloud-provider location attributed to one zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCenter {
    pub provider: String,
    pub code: String,
    pub country_code: String,
}

impl DataCenter {
    pub fn new(
        provider: impl Into<String>,
        code: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            code: code.into(),
            country_code: country_code.into(),
        }
    }

    /// `{provider}-{code}`, as used in series file names and logs.
    pub fn name(&self) -> String {
        format!("{}-{}", self.provider, self.code)
    }
}

// Entrées du fichier de régions : country_code peut être null (région non rattachable)
#[derive(Debug, Deserialize)]
struct RegionRecord {
    provider: String,
    code: String,
    country_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Zone {
    pub code: String,
    /// Last successful raw response, overwritten on every successful poll.
    pub last_response: Option<Value>,
}

#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
    data_centers: Vec<DataCenter>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose zones are the distinct country codes of `data_centers`.
    pub fn from_data_centers(data_centers: Vec<DataCenter>) -> Self {
        let mut registry = Self::new();
        for dc in &data_centers {
            registry.add_zone(&dc.country_code);
        }
        registry.data_centers = data_centers;
        registry
    }

    /// Registry with bare zones and no data centers.
    pub fn from_zones<I, S>(zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for zone in zones {
            registry.add_zone(zone.as_ref());
        }
        registry
    }

    /// Loads a regions file: a JSON array of `{provider, code, country_code, ...}`.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let records: Vec<RegionRecord> =
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        let total = records.len();
        let data_centers: Vec<DataCenter> = records
            .into_iter()
            .filter_map(|r| match r.country_code {
                Some(country_code) => Some(DataCenter {
                    provider: r.provider,
                    code: r.code,
                    country_code,
                }),
                None => {
                    debug!(provider = %r.provider, code = %r.code, "region has no country code, skipped");
                    None
                }
            })
            .collect();

        let registry = Self::from_data_centers(data_centers);
        info!(
            regions = total,
            data_centers = registry.data_centers.len(),
            zones = registry.zones.len(),
            path = %path.display(),
            "loaded cloud regions"
        );
        Ok(registry)
    }

    /// Adds a zone if it is not registered yet; returns whether it was added.
    pub fn add_zone(&mut self, code: &str) -> bool {
        if self.zone(code).is_some() {
            return false;
        }
        self.zones.push(Zone {
            code: code.to_string(),
            last_response: None,
        });
        true
    }

    pub fn zone(&self, code: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.code == code)
    }

    pub fn zone_codes(&self) -> Vec<String> {
        self.zones.iter().map(|z| z.code.clone()).collect()
    }

    pub fn data_centers(&self) -> &[DataCenter] {
        &self.data_centers
    }

    /// Data centers located in `zone`, in load order.
    pub fn data_centers_in<'a>(&'a self, zone: &'a str) -> impl Iterator<Item = &'a DataCenter> + 'a {
        self.data_centers.iter().filter(move |dc| dc.country_code == zone)
    }

    /// Replaces the cached response of `zone`; unknown zones are ignored.
    pub fn record_response(&mut self, zone: &str, response: Value) {
        if let Some(z) = self.zones.iter_mut().find(|z| z.code == zone) {
            z.last_response = Some(response);
        }
    }

    pub fn last_response(&self, zone: &str) -> Option<&Value> {
        self.zone(zone).and_then(|z| z.last_response.as_ref())
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}
