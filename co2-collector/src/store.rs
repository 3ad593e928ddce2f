/**
 * SERIES STORE - Persistance des mesures en fichiers CSV append-only
 *
 * RÔLE : Une série par zone ({output_dir}/{zone}.csv) et une série par data center
 * ({output_dir}/providers/{provider}-{code}-series.csv).
 *
 * FONCTIONNEMENT :
 * - Création paresseuse : l'en-tête est écrit dans un fichier temporaire voisin,
 *   puis publié sous le nom final par lien sans écrasement (atomique). Un fichier
 *   visible a donc toujours son en-tête en première ligne
 * - Fichier existant : jamais réécrit ni validé, append uniquement
 * - Chaque écriture = open-append-close, aucun handle gardé entre deux appels
 */

use crate::error::StoreError;
use std::borrow::Cow;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub const PROVIDERS_DIR: &str = "providers";

const ZONE_COLUMNS: &[&str] = &[
    "timestamp",
    "zone_datetime",
    "status",
    "zone_name",
    "carbon_intensity_avg",
    "carbon_intensity_unit",
    "fossil_fuel_percentage",
];

const DATA_CENTER_COLUMNS: &[&str] = &[
    "timestamp",
    "zone_datetime",
    "status",
    "provider",
    "code",
    "zone_name",
    "zone_carbon_intensity_avg",
    "zone_carbon_intensity_unit",
];

/// Header layout of a series file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Zone,
    DataCenter,
}

impl Schema {
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Schema::Zone => ZONE_COLUMNS,
            Schema::DataCenter => DATA_CENTER_COLUMNS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Schema::Zone => "zone",
            Schema::DataCenter => "data-center",
        }
    }
}

/// Identity of a series; maps to exactly one file under the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesId {
    Zone(String),
    DataCenter { provider: String, code: String },
}

impl SeriesId {
    pub fn zone(code: impl Into<String>) -> Self {
        SeriesId::Zone(code.into())
    }

    pub fn data_center(provider: impl Into<String>, code: impl Into<String>) -> Self {
        SeriesId::DataCenter {
            provider: provider.into(),
            code: code.into(),
        }
    }

    /// Path relative to the output directory.
    pub fn relative_path(&self) -> PathBuf {
        match self {
            SeriesId::Zone(zone) => PathBuf::from(format!("{zone}.csv")),
            SeriesId::DataCenter { provider, code } => {
                Path::new(PROVIDERS_DIR).join(format!("{provider}-{code}-series.csv"))
            }
        }
    }

    pub fn schema(&self) -> Schema {
        match self {
            SeriesId::Zone(_) => Schema::Zone,
            SeriesId::DataCenter { .. } => Schema::DataCenter,
        }
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesId::Zone(zone) => write!(f, "{zone}"),
            SeriesId::DataCenter { provider, code } => write!(f, "{provider}-{code}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeriesStore {
    root: PathBuf,
}

impl SeriesStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, series: &SeriesId) -> PathBuf {
        self.root.join(series.relative_path())
    }

    /// Appends one row to `series`, creating the file with a `schema` header first if needed.
    pub fn append<S: AsRef<str>>(
        &self,
        series: &SeriesId,
        row: &[S],
        schema: Schema,
    ) -> Result<(), StoreError> {
        let columns = schema.columns();
        if row.len() != columns.len() {
            return Err(StoreError::ColumnMismatch {
                schema: schema.name(),
                expected: columns.len(),
                actual: row.len(),
            });
        }

        let path = self.path_for(series);
        let parent = path.parent().unwrap_or(self.root.as_path());
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let io_err = |source: io::Error| StoreError::Io {
            path: path.clone(),
            source,
        };

        if !path.exists() {
            let header = encode_record(columns);
            if publish_new(&path, |tmp| tmp.write_all(header.as_bytes())).map_err(io_err)? {
                info!(series = %series, path = %path.display(), "created series file");
            }
        }

        let mut file = OpenOptions::new().append(true).open(&path).map_err(io_err)?;
        file.write_all(encode_record(row).as_bytes()).map_err(io_err)?;
        debug!(series = %series, "row appended");
        Ok(())
    }
}

/// Publishes a file at `path` filled by `fill`, unless one already exists.
///
/// The content is written next to `path` first and linked into place without
/// clobbering, so `path` never exists partially written. Returns `false` when
/// another writer published first. On any error nothing is left behind.
fn publish_new<F>(path: &Path, fill: F) -> io::Result<bool>
where
    F: FnOnce(&mut NamedTempFile) -> io::Result<()>,
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".series-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    fill(&mut tmp)?;
    tmp.as_file().sync_data()?;

    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        // Le temporaire est supprimé avec l'erreur
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}

/// One CSV line, newline-terminated; fields with separators or quotes are quoted.
pub fn encode_record<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
