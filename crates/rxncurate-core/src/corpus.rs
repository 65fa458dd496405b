//! Corpus files: combine, load, save.
//!
//! Saves go through a temporary file in the destination directory and are
//! renamed into place, so a failed save leaves the previous file untouched.

use crate::model::{Corpus, ReactionRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Concatenate batches in the order given.
pub fn combine(batches: impl IntoIterator<Item = Vec<ReactionRecord>>) -> Corpus {
    batches.into_iter().flatten().collect()
}

pub fn load(path: &Path) -> Result<Corpus, CorpusError> {
    read_json(path)
}

/// Write the corpus atomically. Failure is returned, never panics, and the
/// previous contents of `path` survive it.
pub fn save(corpus: &[ReactionRecord], path: &Path) -> Result<(), CorpusError> {
    write_json_atomic(corpus, path).map_err(|err| {
        warn!(path = %path.display(), error = %err, "corpus not saved");
        err
    })
}

/// Load every input, concatenate and save the result to `output`.
pub fn combine_files(inputs: &[impl AsRef<Path>], output: &Path) -> Result<Corpus, CorpusError> {
    let mut batches = Vec::with_capacity(inputs.len());
    for input in inputs {
        batches.push(load(input.as_ref())?);
    }
    let combined = combine(batches);
    save(&combined, output)?;
    info!(
        inputs = inputs.len(),
        records = combined.len(),
        output = %output.display(),
        "combined corpus files"
    );
    Ok(combined)
}

/// Write any serializable value to `path` with the same atomic replace as
/// [`save`].
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), CorpusError> {
    write_json_atomic(value, path)
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CorpusError> {
    let file = File::open(path).map_err(|source| CorpusError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CorpusError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    value: &T,
    path: &Path,
) -> Result<(), CorpusError> {
    let write_err = |source: std::io::Error| CorpusError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer(&mut writer, value).map_err(|source| CorpusError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush().map_err(write_err)?;
    }
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}
