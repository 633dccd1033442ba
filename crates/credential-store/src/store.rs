use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::record::CredentialRecord;

/// Directory under the user's home holding hooktunnel state.
pub const CONFIG_DIR: &str = ".hooktunnel";

/// File name of the credential record inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.json";

/// Errors raised while reading or writing the credential record.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("not authenticated: no credential file at {}", .path.display())]
    Missing { path: PathBuf },

    #[error("credential file {} is empty", .path.display())]
    Empty { path: PathBuf },

    #[error("failed to read credential file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("credential file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize credential record: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to create credential directory: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("failed to write credential file: {0}")]
    Write(#[source] std::io::Error),

    #[error("failed to replace credential file: {0}")]
    Persist(#[source] tempfile::PersistError),
}

impl CredentialError {
    /// `true` for the errors that mean "run `login` first" rather than an
    /// I/O fault.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::Missing { .. } | Self::Empty { .. } | Self::Corrupt { .. }
        )
    }
}

/// Result of [`CredentialStore::update_user_settings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsUpdate {
    /// Stored settings already matched; nothing was written.
    Unchanged,
    /// The record was rewritten with the new settings.
    Written,
}

/// Handle on the credential file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.hooktunnel/config.json`, or `None` when no home directory can be
    /// determined.
    pub fn default_location() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(CONFIG_DIR).join(CONFIG_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read and parse the record.
    pub fn load(&self) -> Result<CredentialRecord, CredentialError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::Missing {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(CredentialError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if contents.trim().is_empty() {
            return Err(CredentialError::Empty {
                path: self.path.clone(),
            });
        }

        serde_json::from_str(&contents).map_err(|source| CredentialError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Atomically replace the record on disk with owner-only permissions.
    ///
    /// The new contents are written to a temporary file in the same directory
    /// and renamed over the old file, so a concurrent reader sees either the
    /// old or the new record, never a partial one.
    pub fn save(&self, record: &CredentialRecord) -> Result<(), CredentialError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(CredentialError::CreateDir)?;

        let json = serde_json::to_vec_pretty(record).map_err(CredentialError::Serialize)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(CredentialError::Write)?;
        restrict_permissions(tmp.as_file()).map_err(CredentialError::Write)?;
        tmp.write_all(&json).map_err(CredentialError::Write)?;
        tmp.as_file().sync_all().map_err(CredentialError::Write)?;
        tmp.persist(&self.path).map_err(CredentialError::Persist)?;

        tracing::debug!(path = %self.path.display(), "credential record written");
        Ok(())
    }

    /// Replace the stored user settings with `settings`.
    ///
    /// The record is re-read from disk and compared structurally; when the
    /// stored settings (an empty object if none) already equal `settings`
    /// nothing is written.
    pub fn update_user_settings(&self, settings: &Value) -> Result<SettingsUpdate, CredentialError> {
        let mut record = self.load()?;

        let empty = Value::Object(Default::default());
        let current = record.user.settings.as_ref().unwrap_or(&empty);
        if current == settings {
            tracing::debug!("user settings unchanged; skipping write");
            return Ok(SettingsUpdate::Unchanged);
        }

        record.user.settings = Some(settings.clone());
        self.save(&record)?;

        tracing::info!(path = %self.path.display(), "user settings updated");
        Ok(SettingsUpdate::Written)
    }
}

#[cfg(unix)]
fn restrict_permissions(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}
