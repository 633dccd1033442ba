use std::sync::LazyLock;

use regex::Regex;

/// Host used when the operator does not pass `--host`.
pub const DEFAULT_HOST: &str = "http://localhost";

/// A `/` preceded by anything but `:` and followed by more slashes. The
/// scheme separator `://` never matches because its first slash follows `:`.
static DUPLICATE_SLASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^:]/)/+").unwrap());

/// Where relayed webhooks are re-issued.
///
/// The base is `host[:port]`; the path is either the operator's explicit
/// override or the default path configured on the relay endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardTarget {
    host: String,
    port: Option<u16>,
    path_override: Option<String>,
}

impl Default for ForwardTarget {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

impl ForwardTarget {
    /// Build a target. A host without a scheme is assumed to be plain HTTP,
    /// and a single leading `/` is stripped from the path override.
    pub fn new(host: Option<String>, port: Option<u16>, path_override: Option<String>) -> Self {
        let host = match host {
            Some(host) if !host.trim().is_empty() => {
                let host = host.trim().to_string();
                if host.contains("://") {
                    host
                } else {
                    format!("http://{host}")
                }
            }
            _ => DEFAULT_HOST.to_string(),
        };

        Self {
            host,
            port,
            path_override: path_override.map(|p| strip_leading_separator(&p).to_string()),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path_override(&self) -> Option<&str> {
        self.path_override.as_deref()
    }

    /// `host[:port]` without any path.
    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{port}", self.host),
            None => self.host.clone(),
        }
    }

    /// Full URL for one delivery.
    ///
    /// The override wins over the endpoint default. With neither, the
    /// delivery goes to the base URL's root.
    pub fn resolve(&self, endpoint_default: Option<&str>) -> String {
        let path = self
            .path_override
            .as_deref()
            .or(endpoint_default)
            .unwrap_or_default();
        collapse_duplicate_slashes(&format!("{}/{path}", self.base_url()))
    }
}

/// Remove one leading `/`, if present.
pub fn strip_leading_separator(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Collapse runs of `/` into one, leaving the scheme's `://` intact.
pub fn collapse_duplicate_slashes(url: &str) -> String {
    DUPLICATE_SLASHES.replace_all(url, "$1").into_owned()
}
