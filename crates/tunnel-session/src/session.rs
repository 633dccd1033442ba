use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use crate::dispatch::{Dispatched, Dispatcher};
use crate::message::OutboundMessage;
use crate::observer::{CloseInfo, ConnectionDetails, ErrorKind, SessionObserver};
use crate::stats::{StatsSummary, StatsWindow};

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// User id sent when the credential record has none.
const FALLBACK_USER_ID: &str = "demo";

/// Close code reported when the peer went away without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid relay URL '{url}': {source}")]
    InvalidUrl { url: String, source: url::ParseError },

    #[error("failed to connect to relay: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("relay connection failed: {0}")]
    Transport(#[source] tungstenite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Relay base URL, e.g. `wss://pluto.hooktunnel.dev`.
    pub relay_url: String,
    pub user_id: String,
    /// API key presented to the relay.
    pub token: String,
    /// Only receive webhooks for this endpoint slug.
    pub endpoint: Option<String>,
    pub ping_interval: Duration,
    pub stats_interval: Duration,
    /// How long to wait for the relay to acknowledge our close frame.
    pub close_timeout: Duration,
}

impl SessionConfig {
    pub fn new(
        relay_url: impl Into<String>,
        user_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            relay_url: relay_url.into(),
            user_id: user_id.into(),
            token: token.into(),
            endpoint: None,
            ping_interval: DEFAULT_PING_INTERVAL,
            stats_interval: DEFAULT_STATS_INTERVAL,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint.filter(|e| !e.is_empty());
        self
    }

    /// `{relay}/ws?userId=..&token=..[&endpointId=..]`, query values
    /// percent-encoded.
    pub fn connection_url(&self) -> Result<Url, SessionError> {
        let base = format!("{}/ws", self.relay_url.trim_end_matches('/'));
        let mut url = Url::parse(&base).map_err(|source| SessionError::InvalidUrl {
            url: base.clone(),
            source,
        })?;

        let user_id = if self.user_id.is_empty() {
            FALLBACK_USER_ID
        } else {
            &self.user_id
        };

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("userId", user_id)
                .append_pair("token", &self.token);
            if let Some(endpoint) = &self.endpoint {
                query.append_pair("endpointId", endpoint);
            }
        }

        Ok(url)
    }
}

/// How a session that reached the relay ended.
#[derive(Debug, Clone)]
pub struct SessionEnd {
    pub close: CloseInfo,
    pub summary: StatsSummary,
}

/// One relay connection, from handshake to close.
///
/// All inbound frames, keep-alive pings, stats ticks and the shutdown
/// signal are handled on a single task, so handlers never race.
pub struct Session {
    config: SessionConfig,
    dispatcher: Dispatcher,
    observer: Arc<dyn SessionObserver>,
    stats: StatsWindow,
    state: SessionState,
    session_id: Option<String>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Session {
    pub fn new(
        config: SessionConfig,
        dispatcher: Dispatcher,
        observer: Arc<dyn SessionObserver>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            observer,
            stats: StatsWindow::new(),
            state: SessionState::Connecting,
            session_id: None,
            shutdown_rx,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session id assigned by the relay, once the `connected` message arrived.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Connect and run until the connection closes.
    ///
    /// Returns `Ok` for a close (remote, operator-initiated, or the peer
    /// vanishing) and `Err` when the connection could not be opened or broke
    /// with a transport error. The state ends as `Closed` or `Failed`
    /// accordingly.
    pub async fn run(&mut self) -> Result<SessionEnd, SessionError> {
        let url = match self.config.connection_url() {
            Ok(url) => url,
            Err(err) => return Err(self.fail(err)),
        };

        tracing::info!(relay = %redacted(&url), "connecting to relay");

        let (ws, _response) = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok(connected) => connected,
            Err(err) => return Err(self.fail(SessionError::Connect(err))),
        };

        self.state = SessionState::Active;
        self.stats.reset_start();
        tracing::info!(endpoint = ?self.config.endpoint, "relay connection open");

        let target = self.dispatcher.forwarder().target();
        self.observer.on_connect(&ConnectionDetails {
            user_id: self.config.user_id.clone(),
            endpoint: self.config.endpoint.clone(),
            forward_base: target.base_url(),
            path_override: target.path_override().map(str::to_string),
        });

        let (mut write, mut read) = ws.split();

        let mut ping = tokio::time::interval_at(
            Instant::now() + self.config.ping_interval,
            self.config.ping_interval,
        );
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats_tick = tokio::time::interval_at(
            Instant::now() + self.config.stats_interval,
            self.config.stats_interval,
        );
        stats_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Cleared once the shutdown sender is gone so a closed channel does
        // not spin the loop.
        let mut shutdown_armed = true;
        let mut close_deadline: Option<Instant> = None;

        let close = loop {
            let closing = close_deadline.is_some();
            let deadline = close_deadline.unwrap_or_else(Instant::now);

            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !closing {
                            self.handle_frame(text.as_bytes()).await;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        if !closing {
                            self.handle_frame(&bytes).await;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "relay closed the connection");
                        break close_info(frame, closing);
                    }
                    // Control frames are answered by tungstenite.
                    Some(Ok(_)) => {}
                    Some(Err(err)) if is_abrupt_close(&err) || closing => {
                        tracing::warn!(%err, "relay connection dropped");
                        break abnormal_close(closing);
                    }
                    Some(Err(err)) => {
                        return Err(self.fail(SessionError::Transport(err)));
                    }
                    None => break abnormal_close(closing),
                },

                _ = ping.tick(), if !closing => {
                    let frame = OutboundMessage::Ping.frame();
                    if let Err(err) = write.send(Message::Text(frame.into())).await {
                        return Err(self.fail(SessionError::Transport(err)));
                    }
                    tracing::trace!("ping sent");
                }

                _ = stats_tick.tick(), if !closing => {
                    if self.stats.has_activity() {
                        self.observer.on_stats_tick(&self.stats.summarize());
                    }
                }

                signal = self.shutdown_rx.recv(), if shutdown_armed && !closing => match signal {
                    Err(RecvError::Closed) => shutdown_armed = false,
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        tracing::info!("shutdown requested; closing relay connection");
                        self.observer.on_shutdown_requested();
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: String::from("agent shutting down").into(),
                        };
                        if let Err(err) = write.send(Message::Close(Some(frame))).await {
                            tracing::debug!(%err, "close frame not sent");
                            break abnormal_close(true);
                        }
                        close_deadline = Some(Instant::now() + self.config.close_timeout);
                    }
                },

                _ = tokio::time::sleep_until(deadline), if closing => {
                    tracing::warn!(
                        timeout_secs = self.config.close_timeout.as_secs(),
                        "relay did not acknowledge close"
                    );
                    break abnormal_close(true);
                }
            }
        };

        if let Err(err) = write.close().await {
            tracing::debug!(%err, "relay sink not closed cleanly");
        }

        self.state = SessionState::Closed;
        let summary = self.stats.summarize();
        tracing::info!(
            code = ?close.code,
            total = summary.total,
            success = summary.success,
            failure = summary.failure,
            "relay session closed"
        );
        self.observer.on_disconnect(&close, &summary);

        Ok(SessionEnd { close, summary })
    }

    async fn handle_frame(&mut self, frame: &[u8]) {
        if let Dispatched::Connected(Some(id)) =
            self.dispatcher.dispatch(frame, &mut self.stats).await
        {
            self.session_id = Some(id);
        }
    }

    fn fail(&mut self, err: SessionError) -> SessionError {
        tracing::error!(%err, "relay session failed");
        self.state = SessionState::Failed;
        self.observer.on_error(ErrorKind::Transport, &err.to_string());
        err
    }
}

fn close_info(frame: Option<CloseFrame>, interrupted: bool) -> CloseInfo {
    match frame {
        Some(frame) => {
            let reason = frame.reason.to_string();
            CloseInfo {
                code: Some(u16::from(frame.code)),
                reason: (!reason.is_empty()).then_some(reason),
                interrupted,
            }
        }
        None => CloseInfo {
            code: None,
            reason: None,
            interrupted,
        },
    }
}

fn abnormal_close(interrupted: bool) -> CloseInfo {
    CloseInfo {
        code: Some(ABNORMAL_CLOSURE),
        reason: None,
        interrupted,
    }
}

/// The peer went away without a closing handshake. Treated as a close, not
/// a transport failure.
fn is_abrupt_close(err: &tungstenite::Error) -> bool {
    matches!(
        err,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake)
    )
}

/// The connection URL with its token masked, for logs.
fn redacted(url: &Url) -> String {
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == "token" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), value)
        })
        .collect();
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_url_carries_identity() {
        let config = SessionConfig::new("wss://relay.example.dev", "u1", "whl_abc")
            .with_endpoint(Some("stripe".into()));
        let url = config.connection_url().unwrap();
        assert_eq!(
            url.as_str(),
            "wss://relay.example.dev/ws?userId=u1&token=whl_abc&endpointId=stripe"
        );
    }

    #[test]
    fn connection_url_without_endpoint() {
        let config = SessionConfig::new("wss://relay.example.dev/", "u1", "whl_abc");
        let url = config.connection_url().unwrap();
        assert_eq!(url.path(), "/ws");
        assert!(url.query_pairs().all(|(k, _)| k != "endpointId"));
    }

    #[test]
    fn empty_endpoint_means_all_endpoints() {
        let config = SessionConfig::new("wss://r", "u1", "t").with_endpoint(Some(String::new()));
        assert_eq!(config.endpoint, None);
    }

    #[test]
    fn missing_user_id_falls_back() {
        let config = SessionConfig::new("ws://127.0.0.1:9", "", "t");
        let url = config.connection_url().unwrap();
        assert!(url.query_pairs().any(|(k, v)| k == "userId" && v == "demo"));
    }

    #[test]
    fn query_values_are_encoded() {
        let config = SessionConfig::new("wss://r.dev", "a b", "k&y=1");
        let url = config.connection_url().unwrap();
        assert_eq!(url.query(), Some("userId=a+b&token=k%26y%3D1"));
    }

    #[test]
    fn invalid_relay_url() {
        let err = SessionConfig::new("not a url", "u", "t")
            .connection_url()
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidUrl { .. }));
        assert!(err.to_string().contains("not a url"));
    }

    #[test]
    fn token_is_masked_in_logs() {
        let url = SessionConfig::new("wss://r.dev", "u1", "whl_secret")
            .connection_url()
            .unwrap();
        let shown = redacted(&url);
        assert!(!shown.contains("whl_secret"));
        assert!(shown.contains("userId=u1"));
    }

    #[test]
    fn close_frame_details() {
        let info = close_info(
            Some(CloseFrame {
                code: CloseCode::Away,
                reason: String::from("maintenance").into(),
            }),
            false,
        );
        assert_eq!(info.code, Some(1001));
        assert_eq!(info.reason.as_deref(), Some("maintenance"));

        let info = close_info(None, true);
        assert_eq!(info.code, None);
        assert!(info.interrupted);
    }
}
