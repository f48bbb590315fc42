//! Pact file persistence.
//!
//! A pact file is shared by every test and every process that verifies
//! messages for the same consumer/provider pair. Writers take a per-path
//! lock (an in-process mutex plus an exclusive lock on a sidecar `.lock`
//! file), read the current file, merge, and replace it atomically.

use crate::contract::Contract;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};
use tempfile::NamedTempFile;
use thiserror::Error;

static PATH_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> =
    LazyLock::new(Default::default);

/// Pact file storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Existing pact file could not be parsed
    #[error("Unreadable pact file {}: {source}", path.display())]
    Corrupt {
        /// Path of the pact file
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: serde_json::Error,
    },

    /// Pact could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Existing pact file cannot be merged with the new contract
    #[error("Incompatible pact file: {0}")]
    Incompatible(String),
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Reads and writes pact files under one directory.
#[derive(Debug, Clone)]
pub struct ContractStore {
    pact_dir: PathBuf,
}

impl ContractStore {
    /// Create a store rooted at `pact_dir`. The directory is created on first write.
    #[must_use]
    pub fn new(pact_dir: impl Into<PathBuf>) -> Self {
        Self {
            pact_dir: pact_dir.into(),
        }
    }

    /// Directory pact files are written to.
    #[must_use]
    pub fn pact_dir(&self) -> &Path {
        &self.pact_dir
    }

    /// Path of the pact file for a consumer/provider pair.
    #[must_use]
    pub fn path_for(&self, consumer: &str, provider: &str) -> PathBuf {
        self.pact_dir.join(pact_file_name(consumer, provider))
    }

    /// Load the pact file for a pair, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read and
    /// [`StoreError::Corrupt`] if it cannot be parsed.
    pub fn load(&self, consumer: &str, provider: &str) -> Result<Option<Contract>, StoreError> {
        read_contract(&self.path_for(consumer, provider))
    }

    /// Write a contract to its pact file.
    ///
    /// Unless `overwrite` is set, the contract is merged into the existing
    /// file: interactions already recorded are kept as they are and new ones
    /// are appended. Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the directory, lock or file cannot be
    /// accessed, the existing file is unreadable, or the existing file belongs
    /// to another pair or pact specification.
    pub fn write(&self, contract: &Contract, overwrite: bool) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.pact_dir)
            .map_err(|source| StoreError::io(&self.pact_dir, source))?;
        let dir = fs::canonicalize(&self.pact_dir)
            .map_err(|source| StoreError::io(&self.pact_dir, source))?;
        let path = dir.join(pact_file_name(&contract.consumer.name, &contract.provider.name));

        let slot = path_mutex(&path);
        let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let _file_lock = lock_file(&lock_path_for(&path))?;

        let existing = if overwrite { None } else { read_contract(&path)? };
        let (merged, added) = match existing {
            Some(existing) => {
                let mut merged = existing.clone();
                let added = merged.merge(contract)?;
                if merged == existing {
                    tracing::debug!(path = %path.display(), "pact file already up to date");
                    return Ok(path);
                }
                (merged, added)
            }
            None => (contract.clone(), contract.interactions.len()),
        };

        write_atomically(&path, &merged)?;
        tracing::info!(
            path = %path.display(),
            added,
            total = merged.interactions.len(),
            overwrite,
            "pact file written"
        );
        Ok(path)
    }
}

/// File name for a pair: `<consumer>-<provider>.json`.
#[must_use]
pub fn pact_file_name(consumer: &str, provider: &str) -> String {
    format!("{}-{}.json", sanitize(consumer), sanitize(provider))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

fn path_mutex(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = PATH_LOCKS.lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(path.to_path_buf()).or_default())
}

/// Open the sidecar lock file and block until the exclusive lock is held.
///
/// The lock is released when the returned handle is dropped.
fn lock_file(lock_path: &Path) -> Result<File, StoreError> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .map_err(|source| StoreError::io(lock_path, source))?;
    file.lock().map_err(|source| StoreError::io(lock_path, source))?;
    Ok(file)
}

fn read_contract(path: &Path) -> Result<Option<Contract>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(StoreError::io(path, source)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Write to a temporary file in the target directory, then rename over the target.
fn write_atomically(path: &Path, contract: &Contract) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir).map_err(|source| StoreError::io(dir, source))?;
    serde_json::to_writer_pretty(&mut temp, contract)?;
    temp.write_all(b"\n")
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|source| StoreError::io(temp.path(), source))?;
    temp.persist(path)
        .map_err(|err| StoreError::io(path, err.error))?;
    Ok(())
}
