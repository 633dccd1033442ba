//! Persisted credential record for the hooktunnel agent.
//!
//! The record lives at `~/.hooktunnel/config.json` and holds the API key, the
//! authenticated user's identity, and the user's display/behaviour settings as
//! last pushed by the relay. Every write goes through a temporary file in the
//! same directory followed by an atomic rename, and the file is restricted to
//! owner read/write.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use credential_store::{CredentialStore, SettingsUpdate};
//!
//! # fn example() -> Result<(), credential_store::CredentialError> {
//! let store = CredentialStore::default_location().expect("home directory");
//! let record = store.load()?;
//! println!("logged in as {}", record.user.display_name());
//!
//! let outcome = store.update_user_settings(&serde_json::json!({"darkMode": true}))?;
//! assert!(matches!(outcome, SettingsUpdate::Written | SettingsUpdate::Unchanged));
//! # Ok(())
//! # }
//! ```

pub mod record;
pub mod store;

pub use record::{CredentialRecord, UserIdentity, UserSettings};
pub use store::{CredentialError, CredentialStore, SettingsUpdate, CONFIG_DIR, CONFIG_FILE};
