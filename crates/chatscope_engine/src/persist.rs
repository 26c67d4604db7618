use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use chatscope_core::{DataKind, SessionData};
use engine_logging::engine_info;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Creates `dir` if needed and checks that files can be written into it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Writes exported session data into one directory, each file replaced atomically.
pub struct ExportWriter {
    dir: PathBuf,
}

impl ExportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `contents` to `{dir}/{filename}` through a temp file and a rename,
    /// so readers never observe a half-written export.
    pub fn write(&self, filename: &str, contents: &str) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;

        engine_info!("Wrote {} bytes to {}", contents.len(), target.display());
        Ok(target)
    }
}

/// Reads an exported file back as raw text, ready for [`SessionData::from_json`].
pub fn read_export(path: &Path) -> Result<String, PersistError> {
    fs::read_to_string(path).map_err(|source| PersistError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Guesses the data kind of an export from its file name.
///
/// Matches the default export names first, then looks for `report`,
/// `filtered` or `processed` anywhere in the stem.
pub fn kind_from_filename(path: &Path) -> Option<DataKind> {
    let name = path.file_name()?.to_str()?;
    if let Some(kind) = DataKind::ALL
        .into_iter()
        .find(|kind| kind.default_filename() == name)
    {
        return Some(kind);
    }
    let stem = path.file_stem()?.to_str()?.to_ascii_lowercase();
    if stem.contains("report") {
        Some(DataKind::Report)
    } else if stem.contains("filtered") {
        Some(DataKind::Filtered)
    } else if stem.contains("processed") {
        Some(DataKind::Processed)
    } else {
        None
    }
}

/// Loads and validates an export; the error is the text shown to the user.
pub fn load_export(kind: DataKind, path: &Path) -> Result<SessionData, String> {
    let contents = read_export(path).map_err(|err| err.to_string())?;
    SessionData::from_json(kind, &contents).map_err(|err| err.to_string())
}
