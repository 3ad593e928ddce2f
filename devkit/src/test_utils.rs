/*!
Test Harness pour le collecteur

Facilite l'écriture de tests de bout en bout avec:
- Répertoire de sortie temporaire
- Stub de l'API co2signal
- Fichiers tokens / régions générés
- Lecture et assertions sur les séries CSV produites
*/

use crate::api_stub::StubApi;
use anyhow::{Context, Result};
use co2_collector::{Collector, Credential, CredentialRotator, DataCenter, SeriesId, SeriesStore, ZoneRegistry};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary output directory plus a scripted API.
///
/// Fixture files (tokens, regions) live next to the output directory, not in it.
pub struct TestHarness {
    pub api: StubApi,
    dir: TempDir,
    output: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::try_init().ok(); // Init logging pour tests

        let dir = TempDir::new().expect("cannot create temporary directory");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&output).expect("cannot create output directory");

        Self {
            api: StubApi::new(),
            dir,
            output,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output
    }

    /// Collector over the stub API writing into the harness directory.
    pub fn collector(&self, owners: &[&str], data_centers: Vec<DataCenter>) -> Collector<StubApi> {
        self.collector_with_registry(owners, ZoneRegistry::from_data_centers(data_centers))
    }

    pub fn collector_with_registry(&self, owners: &[&str], registry: ZoneRegistry) -> Collector<StubApi> {
        let credentials = owners
            .iter()
            .map(|owner| Credential::new(*owner, format!("token-{owner}")))
            .collect();
        Collector::new(
            self.api.clone(),
            CredentialRotator::new(credentials),
            registry,
            SeriesStore::new(self.output_dir()),
        )
    }

    /// Writes a tokens file, `[{"user", "token"}]`.
    pub fn write_tokens(&self, tokens: &[(&str, &str)]) -> Result<PathBuf> {
        let records: Vec<Value> = tokens
            .iter()
            .map(|(user, token)| json!({"user": user, "token": token}))
            .collect();
        self.write_json("tokens.json", &Value::Array(records))
    }

    /// Writes a regions file from data-center records.
    pub fn write_regions(&self, data_centers: &[DataCenter]) -> Result<PathBuf> {
        self.write_json("cloud_regions.json", &serde_json::to_value(data_centers)?)
    }

    pub fn write_json(&self, name: &str, value: &Value) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("cannot write {}", path.display()))?;
        Ok(path)
    }

    pub fn series_path(&self, series: &SeriesId) -> PathBuf {
        self.output_dir().join(series.relative_path())
    }

    /// Lines of a series file, header included.
    pub fn series_lines(&self, series: &SeriesId) -> Result<Vec<String>> {
        let path = self.series_path(series);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read series {}", path.display()))?;
        Ok(content.lines().map(str::to_string).collect())
    }

    /// Data rows of a series split on commas; test data never needs quoting.
    pub fn series_rows(&self, series: &SeriesId) -> Result<Vec<Vec<String>>> {
        let lines = self.series_lines(series)?;
        Ok(lines
            .iter()
            .skip(1)
            .map(|l| l.split(',').map(str::to_string).collect())
            .collect())
    }

    /// Asserts a series has exactly one header and `expected` data rows of matching width.
    pub fn assert_series(&self, series: &SeriesId, expected: usize) -> Result<()> {
        let lines = self.series_lines(series)?;
        let header = lines
            .first()
            .with_context(|| format!("series {series} is empty"))?;
        let columns = header.split(',').count();

        let headers = lines.iter().filter(|l| l.starts_with("timestamp,")).count();
        if headers != 1 {
            anyhow::bail!("series {series}: expected 1 header, found {headers}");
        }
        let rows = lines.len() - 1;
        if rows != expected {
            anyhow::bail!("series {series}: expected {expected} rows, found {rows}");
        }
        for line in lines.iter().skip(1) {
            let width = line.split(',').count();
            if width != columns {
                anyhow::bail!("series {series}: row `{line}` has {width} columns, header has {columns}");
            }
        }

        log::info!("series {} has {} rows as expected", series, rows);
        Ok(())
    }

    /// Every file under the output directory, relative, sorted.
    pub fn written_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        collect_files(self.output_dir(), self.output_dir(), &mut files);
        files.sort();
        files
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_path_buf());
        }
    }
}
