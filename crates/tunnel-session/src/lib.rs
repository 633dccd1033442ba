//! The relay side of the agent: one persistent WebSocket session that
//! receives webhooks and hands them to the local forwarder.
//!
//! # Architecture
//!
//! ```text
//!  relay ──frames──► Session (select loop) ──► Dispatcher ──► Forwarder ──► local app
//!                      │  ping / stats ticks       │
//!                      │  shutdown signal          ├─► StatsWindow
//!                      ▼                           ▼
//!                  SessionObserver ◄───────── console output
//! ```
//!
//! The session owns the socket, the timers and the stats. Everything runs on
//! one task; a webhook forward is awaited before the next frame is read.

pub mod dispatch;
pub mod message;
pub mod observer;
pub mod session;
pub mod stats;

pub use dispatch::{Dispatched, Dispatcher};
pub use message::{DecodeError, EndpointInfo, InboundMessage, OutboundMessage};
pub use observer::{CloseInfo, ConnectionDetails, ErrorKind, SessionObserver};
pub use session::{
    Session, SessionConfig, SessionEnd, SessionError, SessionState, DEFAULT_CLOSE_TIMEOUT,
    DEFAULT_PING_INTERVAL, DEFAULT_STATS_INTERVAL,
};
pub use stats::{StatsSummary, StatsWindow, LATENCY_WINDOW};
