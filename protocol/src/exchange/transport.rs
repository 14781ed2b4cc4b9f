//! Session transport between two parties.
//!
//! [`SessionTransport`] is what the exchange drivers talk to. The in-process
//! [`LocalTransport`] frames every message as JSON over a tokio channel, so
//! nothing crosses a session except what survives serialisation.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::trace;

use super::messages::{ExchangeMessage, SessionId};
use crate::identity::PartyId;

/// Errors from the session transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No session with this id is open on this endpoint.
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    /// The counterparty closed the session.
    #[error("session {0} closed by counterparty")]
    Closed(SessionId),

    /// A frame could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

/// Point-to-point, ordered message delivery within a session.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    async fn send(&self, session: SessionId, message: ExchangeMessage)
        -> Result<(), TransportError>;

    /// Wait for the next message. Unbounded; callers apply their own timeout.
    async fn receive(&self, session: SessionId) -> Result<ExchangeMessage, TransportError>;

    /// The authenticated party on the other end of `session`.
    fn counterparty(&self, session: SessionId) -> Result<PartyId, TransportError>;

    /// Drop this endpoint of `session`. The counterparty sees `Closed` once
    /// it has drained what was already sent.
    fn close(&self, session: SessionId);
}

struct Endpoint {
    counterparty: PartyId,
    outbound: mpsc::UnboundedSender<String>,
    inbound: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
}

/// One party's in-process endpoint set.
#[derive(Default)]
pub struct LocalTransport {
    sessions: DashMap<SessionId, Endpoint>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `session` between endpoint `a` (owned by `a_party`) and
    /// endpoint `b` (owned by `b_party`).
    pub fn connect(
        a: &LocalTransport,
        a_party: PartyId,
        b: &LocalTransport,
        b_party: PartyId,
        session: SessionId,
    ) {
        let (a_to_b, b_from_a) = mpsc::unbounded_channel();
        let (b_to_a, a_from_b) = mpsc::unbounded_channel();
        a.sessions.insert(
            session,
            Endpoint {
                counterparty: b_party,
                outbound: a_to_b,
                inbound: Arc::new(Mutex::new(a_from_b)),
            },
        );
        b.sessions.insert(
            session,
            Endpoint {
                counterparty: a_party,
                outbound: b_to_a,
                inbound: Arc::new(Mutex::new(b_from_a)),
            },
        );
    }

    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }
}

#[async_trait]
impl SessionTransport for LocalTransport {
    async fn send(
        &self,
        session: SessionId,
        message: ExchangeMessage,
    ) -> Result<(), TransportError> {
        let frame =
            serde_json::to_string(&message).map_err(|e| TransportError::Codec(e.to_string()))?;
        let endpoint = self
            .sessions
            .get(&session)
            .ok_or(TransportError::UnknownSession(session))?;
        trace!(session_id = %session, kind = message.kind(), bytes = frame.len(), "frame sent");
        endpoint
            .outbound
            .send(frame)
            .map_err(|_| TransportError::Closed(session))
    }

    async fn receive(&self, session: SessionId) -> Result<ExchangeMessage, TransportError> {
        // Clone the receiver handle out so no map guard is held across the await.
        let inbound = self
            .sessions
            .get(&session)
            .map(|e| Arc::clone(&e.inbound))
            .ok_or(TransportError::UnknownSession(session))?;

        let frame = inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed(session))?;
        serde_json::from_str(&frame).map_err(|e| TransportError::Codec(e.to_string()))
    }

    fn counterparty(&self, session: SessionId) -> Result<PartyId, TransportError> {
        self.sessions
            .get(&session)
            .map(|e| e.counterparty)
            .ok_or(TransportError::UnknownSession(session))
    }

    fn close(&self, session: SessionId) {
        self.sessions.remove(&session);
    }
}
