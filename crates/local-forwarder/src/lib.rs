//! Re-issues webhooks received by the relay against a local HTTP target.
//!
//! ```text
//! Relay --webhook--> Forwarder --HTTP--> http://localhost:3000/<path>
//!                        |
//!                 DeliveryOutcome (status | error, elapsed)
//! ```
//!
//! The target URL is `host[:port]` plus either an operator override or the
//! relay endpoint's default path, with duplicate slashes collapsed. Headers
//! are lower-cased and stripped of stale framing headers before sending.
//! A response of any status is a completed delivery; only transport failures
//! (refused connection, DNS, timeout) are reported as errors.

pub mod delivery;
pub mod forward;
pub mod headers;
pub mod response;
pub mod target;

pub use delivery::{DeliveryOutcome, DeliveryResult, WebhookRequest};
pub use forward::{
    ForwardError, ForwardReport, ForwardedResponse, Forwarder, ForwarderConfig, DEFAULT_TIMEOUT,
};
pub use headers::{sanitize_headers, DEFAULT_CONTENT_TYPE};
pub use response::ResponsePreview;
pub use target::{ForwardTarget, DEFAULT_HOST};
