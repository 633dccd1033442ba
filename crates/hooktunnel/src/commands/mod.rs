pub mod connect;
pub mod list;
pub mod login;

use colored::Colorize;
use credential_store::{CredentialError, CredentialRecord, CredentialStore};

use crate::config::AgentConfig;

/// Everything a command needs from the process environment.
pub struct Context {
    pub config: AgentConfig,
    pub credentials: CredentialStore,
}

/// Load the credential record, printing remediation when it is missing,
/// empty or corrupt. `Ok(None)` means the command should exit with 1.
pub fn load_credentials(store: &CredentialStore) -> anyhow::Result<Option<CredentialRecord>> {
    match store.load() {
        Ok(record) => Ok(Some(record)),
        Err(err) if err.is_precondition() => {
            tracing::debug!(%err, "credential precondition failed");
            report_precondition(&err);
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

fn report_precondition(err: &CredentialError) {
    match err {
        CredentialError::Missing { .. } => {
            eprintln!("{}", "Authentication required".red());
            eprintln!("{}", "\n💡 Run this command first:".yellow());
            eprintln!("{}", "   hooktunnel login\n".cyan());
        }
        CredentialError::Empty { .. } => {
            eprintln!("{}", "Config file is empty. Login again.".red());
        }
        other => {
            eprintln!("{} {other}", "Credential file is unreadable:".red());
            eprintln!("{}", "\n💡 Log in again to rewrite it:".yellow());
            eprintln!("{}", "   hooktunnel login\n".cyan());
        }
    }
}
