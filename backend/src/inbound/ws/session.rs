//! Per-connection WebSocket handler.
//!
//! Each connection owns one hub subscription and forwards every vote update
//! as a JSON text frame. The public contract pings every 5s and considers a
//! connection idle after 10s without client traffic. Tests shorten these
//! intervals to speed up feedback.

use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_ws::{CloseCode, CloseReason, Closed, Message, MessageStream, ProtocolError, Session};
use tokio::time;
use tracing::{debug, warn};

use crate::domain::ports::VoteFeed;
use crate::domain::{Subscription, SubscriptionClosed, VoteUpdate};
use crate::inbound::ws::messages::VoteUpdateMessage;

/// Time between heartbeats to the client (5s in production, shorter in tests).
#[cfg(not(test))]
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
#[cfg(test)]
const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(50);

/// Max idle time before disconnecting the client (10s in production, shorter in tests).
#[cfg(not(test))]
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);
#[cfg(test)]
const CLIENT_TIMEOUT: Duration = Duration::from_millis(100);

pub(super) async fn handle_ws_session(
    feed: Arc<dyn VoteFeed>,
    session: Session,
    stream: MessageStream,
) {
    let subscription = match feed.subscribe().await {
        Ok(subscription) => subscription,
        Err(error) => {
            warn!(error = %error, "Vote feed unavailable; refusing WebSocket session");
            let reason = CloseReason {
                code: CloseCode::Again,
                description: Some("vote feed unavailable".to_owned()),
            };
            if let Err(error) = session.close(Some(reason)).await {
                warn!(error = %error, "Failed to close WebSocket session");
            }
            return;
        }
    };

    WsSession::new(subscription).run(session, stream).await;
}

enum SessionError {
    ClientClosed(Option<CloseReason>),
    StreamClosed,
    HeartbeatTimeout,
    Lagged,
    Protocol(ProtocolError),
    Network(Closed),
}

enum CloseAction {
    None,
    Close(Option<CloseReason>),
}

struct WsSession {
    subscription: Subscription,
}

impl WsSession {
    fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    async fn run(mut self, mut session: Session, mut stream: MessageStream) {
        let mut last_heartbeat = Instant::now();
        let mut heartbeat = time::interval(HEARTBEAT_INTERVAL);
        debug!(subscriber = %self.subscription.id(), "WebSocket session started");

        let error = loop {
            let result = tokio::select! {
                _ = heartbeat.tick() => {
                    handle_heartbeat_tick(&mut session, &last_heartbeat).await
                }
                message = stream.recv() => {
                    handle_stream_message(&mut session, &mut last_heartbeat, message).await
                }
                update = self.subscription.recv() => {
                    forward_update(&mut session, update).await
                }
            };

            if let Err(error) = result {
                break error;
            }
        };

        self.subscription.unsubscribe().await;
        log_shutdown_reason(&error);
        close_session_if_needed(session, close_action_for(&error)).await;
    }
}

async fn handle_heartbeat_tick(
    session: &mut Session,
    last_heartbeat: &Instant,
) -> Result<(), SessionError> {
    if Instant::now().duration_since(*last_heartbeat) > CLIENT_TIMEOUT {
        return Err(SessionError::HeartbeatTimeout);
    }

    session.ping(b"").await.map_err(SessionError::Network)
}

async fn handle_stream_message(
    session: &mut Session,
    last_heartbeat: &mut Instant,
    message: Option<Result<Message, ProtocolError>>,
) -> Result<(), SessionError> {
    let Some(message) = message else {
        return Err(SessionError::StreamClosed);
    };

    match message {
        Ok(message) => handle_message(session, last_heartbeat, message).await,
        Err(error) => Err(SessionError::Protocol(error)),
    }
}

async fn handle_message(
    session: &mut Session,
    last_heartbeat: &mut Instant,
    message: Message,
) -> Result<(), SessionError> {
    match message {
        Message::Ping(payload) => {
            *last_heartbeat = Instant::now();
            session.pong(&payload).await.map_err(SessionError::Network)
        }
        // The feed is one-way; client frames only count as liveness.
        Message::Text(_)
        | Message::Pong(_)
        | Message::Binary(_)
        | Message::Continuation(_)
        | Message::Nop => {
            *last_heartbeat = Instant::now();
            Ok(())
        }
        Message::Close(reason) => Err(SessionError::ClientClosed(reason)),
    }
}

async fn forward_update(
    session: &mut Session,
    update: Result<VoteUpdate, SubscriptionClosed>,
) -> Result<(), SessionError> {
    let update = update.map_err(|SubscriptionClosed| SessionError::Lagged)?;
    let message = VoteUpdateMessage::from(update);
    match serde_json::to_string(&message) {
        Ok(body) => session.text(body).await.map_err(SessionError::Network),
        Err(error) => {
            warn!(error = %error, "Failed to serialize vote update");
            Ok(())
        }
    }
}

fn log_shutdown_reason(error: &SessionError) {
    match error {
        SessionError::HeartbeatTimeout => {
            warn!("WebSocket heartbeat timeout; closing connection");
        }
        SessionError::Lagged => {
            warn!("WebSocket subscriber fell behind the vote feed; closing connection");
        }
        SessionError::Protocol(error) => {
            warn!(error = %error, "WebSocket protocol error");
        }
        SessionError::Network(error) => {
            warn!(error = %error, "WebSocket send failed; closing connection");
        }
        SessionError::ClientClosed(_) | SessionError::StreamClosed => {
            debug!("WebSocket client disconnected");
        }
    }
}

fn close_action_for(error: &SessionError) -> CloseAction {
    match error {
        SessionError::HeartbeatTimeout => CloseAction::Close(Some(CloseReason {
            code: CloseCode::Normal,
            description: Some("heartbeat timeout".to_owned()),
        })),
        SessionError::Lagged => CloseAction::Close(Some(CloseReason {
            code: CloseCode::Again,
            description: Some("subscriber lagged".to_owned()),
        })),
        SessionError::Protocol(_) => CloseAction::Close(Some(CloseReason {
            code: CloseCode::Protocol,
            description: Some("protocol error".to_owned()),
        })),
        SessionError::ClientClosed(reason) => CloseAction::Close(reason.clone()),
        SessionError::StreamClosed | SessionError::Network(_) => CloseAction::None,
    }
}

async fn close_session_if_needed(session: Session, close_action: CloseAction) {
    if let CloseAction::Close(reason) = close_action
        && let Err(error) = session.close(reason).await
    {
        warn!(error = %error, "Failed to close WebSocket session");
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
