//! File-backed ledger store

use crate::{Ledger, LedgerEntry, LedgerError, ProbeKey};
use chrono::Utc;
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// What to do when the ledger file exists but cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptPolicy {
    /// Surface [`LedgerError::CorruptStore`] to the caller
    #[default]
    Fail,
    /// Move the unreadable file aside to `<ledger>.corrupt.<timestamp>` and
    /// start empty
    Reset,
}

/// Ledger persisted as a single YAML document.
///
/// Writes take an exclusive advisory lock on a sidecar `<ledger>.lock` file
/// and [`load`](Self::load) takes a shared one when it exists. The
/// data file itself is replaced by rename, so readers never observe a
/// partially written document.
#[derive(Debug, Clone)]
pub struct FailureLedger {
    path: PathBuf,
    lock_path: PathBuf,
    on_corrupt: CorruptPolicy,
}

impl FailureLedger {
    /// Open the ledger at `path`. Nothing is touched on disk until the
    /// first operation.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sidecar(&path, "lock");
        Self {
            path,
            lock_path,
            on_corrupt: CorruptPolicy::default(),
        }
    }

    /// Set the corrupt-file policy
    pub fn with_corrupt_policy(mut self, policy: CorruptPolicy) -> Self {
        self.on_corrupt = policy;
        self
    }

    /// Path of the ledger document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty ledger file (and its directory) if none exists yet
    pub fn ensure_exists(&self) -> Result<(), LedgerError> {
        if let Some(dir) = self.parent_dir() {
            fs::create_dir_all(dir).map_err(|e| LedgerError::unavailable(dir, e))?;
        }

        let mut lock = self.lock_file()?;
        let _guard = lock
            .write()
            .map_err(|e| LedgerError::unavailable(&self.lock_path, e))?;

        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(_) => {
                info!("Created empty ledger at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(LedgerError::unavailable(&self.path, e)),
        }
    }

    /// Read the whole ledger. A missing or empty file is an empty ledger.
    ///
    /// Nothing is created on disk when the ledger does not exist yet, and a
    /// caller without write access to the directory can still read it.
    pub fn load(&self) -> Result<Ledger, LedgerError> {
        match fs::metadata(&self.path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Ledger::new()),
            Err(e) => return Err(LedgerError::unavailable(&self.path, e)),
        }

        match self.shared_lock_file()? {
            Some(lock) => {
                let _guard = lock
                    .read()
                    .map_err(|e| LedgerError::unavailable(&self.lock_path, e))?;
                self.read_unlocked(false)
            }
            // Writers replace the file by rename, so an unlocked read still
            // sees a whole document
            None => self.read_unlocked(false),
        }
    }

    /// Replace the whole ledger
    pub fn save(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        let mut lock = self.lock_file()?;
        let _guard = lock
            .write()
            .map_err(|e| LedgerError::unavailable(&self.lock_path, e))?;
        self.write_unlocked(ledger)
    }

    /// Entry for one probe, the healthy default if absent
    pub fn get(&self, key: &ProbeKey) -> Result<LedgerEntry, LedgerError> {
        Ok(self.load()?.get(key))
    }

    /// Overwrite the entry for one probe
    pub fn set(&self, key: &ProbeKey, entry: LedgerEntry) -> Result<(), LedgerError> {
        self.update(|ledger| ledger.set(key.clone(), entry))
    }

    /// Drop one probe from the ledger. Returns whether it was present.
    pub fn remove(&self, key: &ProbeKey) -> Result<bool, LedgerError> {
        self.update(|ledger| ledger.remove(key).is_some())
    }

    /// Drop every probe from the ledger
    pub fn clear(&self) -> Result<(), LedgerError> {
        self.update(Ledger::clear)
    }

    /// Run `f` against the current ledger while holding the exclusive lock
    /// and persist the result. The file is only rewritten if `f` changed
    /// something.
    pub fn update<T, F>(&self, f: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut Ledger) -> T,
    {
        let mut lock = self.lock_file()?;
        let _guard = lock
            .write()
            .map_err(|e| LedgerError::unavailable(&self.lock_path, e))?;

        let before = self.read_unlocked(true)?;
        let mut ledger = before.clone();
        let result = f(&mut ledger);

        if ledger != before {
            self.write_unlocked(&ledger)?;
        } else {
            debug!("Ledger unchanged, skipping write");
        }

        Ok(result)
    }

    fn parent_dir(&self) -> Option<&Path> {
        self.path.parent().filter(|dir| !dir.as_os_str().is_empty())
    }

    fn lock_file(&self) -> Result<RwLock<File>, LedgerError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| LedgerError::unavailable(&self.lock_path, e))?;
        Ok(RwLock::new(file))
    }

    /// Lock file for a reader. `None` when it does not exist and cannot be
    /// created by this user.
    fn shared_lock_file(&self) -> Result<Option<RwLock<File>>, LedgerError> {
        match File::open(&self.lock_path) {
            Ok(file) => return Ok(Some(RwLock::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!("Reading {} without a lock: {}", self.path.display(), e);
                return Ok(None);
            }
            Err(e) => return Err(LedgerError::unavailable(&self.lock_path, e)),
        }

        match self.lock_file() {
            Ok(lock) => Ok(Some(lock)),
            Err(LedgerError::StoreUnavailable { source, .. })
                if source.kind() == io::ErrorKind::PermissionDenied =>
            {
                debug!("Reading {} without a lock: {}", self.path.display(), source);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// First free `<ledger>.corrupt.<timestamp>[.<n>]`. Caller must hold the
    /// exclusive lock.
    fn backup_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
        let mut backup = sidecar(&self.path, &format!("corrupt.{}", stamp));
        let mut n = 1;
        while backup.exists() {
            backup = sidecar(&self.path, &format!("corrupt.{}.{}", stamp, n));
            n += 1;
        }
        backup
    }

    /// Caller must hold the lock. `exclusive` allows a corrupt file to be
    /// moved aside under [`CorruptPolicy::Reset`].
    fn read_unlocked(&self, exclusive: bool) -> Result<Ledger, LedgerError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Ledger::new()),
            Err(e) => return Err(LedgerError::unavailable(&self.path, e)),
        };

        if text.trim().is_empty() {
            return Ok(Ledger::new());
        }

        match serde_yaml::from_str::<Option<Ledger>>(&text) {
            Ok(ledger) => Ok(ledger.unwrap_or_default()),
            Err(source) => match self.on_corrupt {
                CorruptPolicy::Fail => Err(LedgerError::CorruptStore {
                    path: self.path.clone(),
                    source,
                }),
                CorruptPolicy::Reset => {
                    warn!(
                        "Ledger {} is corrupt ({}), starting from an empty ledger",
                        self.path.display(),
                        source
                    );
                    if exclusive {
                        let backup = self.backup_path();
                        fs::rename(&self.path, &backup)
                            .map_err(|e| LedgerError::unavailable(&self.path, e))?;
                        warn!("Moved corrupt ledger to {}", backup.display());
                    }
                    Ok(Ledger::new())
                }
            },
        }
    }

    /// Caller must hold the exclusive lock
    fn write_unlocked(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        let text = serde_yaml::to_string(ledger)?;
        let dir = self.parent_dir().unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| LedgerError::unavailable(dir, e))?;
        // Keep the mode of the file being replaced
        if let Ok(meta) = fs::metadata(&self.path) {
            tmp.as_file()
                .set_permissions(meta.permissions())
                .map_err(|e| LedgerError::unavailable(tmp.path(), e))?;
        }
        tmp.write_all(text.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| LedgerError::unavailable(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| LedgerError::unavailable(&self.path, e.error))?;

        debug!("Wrote {} ledger entries to {}", ledger.len(), self.path.display());
        Ok(())
    }
}

/// `<path>.<suffix>`, keeping the full original file name
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}
