//! Command and time-window types carried by every transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use crate::identity::PartyId;

// ---------------------------------------------------------------------------
// CommandKind
// ---------------------------------------------------------------------------

/// What a transaction does. Selects the contract rules that apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Create a purchase order without consuming one.
    Issue,
    /// Pay for an item and record the purchase order.
    Purchase,
    /// Move payment tokens between holders. Owned by the token layer, not
    /// by the purchase-order contract.
    Move,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issue => write!(f, "Issue"),
            Self::Purchase => write!(f, "Purchase"),
            Self::Move => write!(f, "Move"),
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A command and the parties whose signatures it demands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub required_signers: BTreeSet<PartyId>,
}

impl Command {
    pub fn new(kind: CommandKind, required_signers: impl IntoIterator<Item = PartyId>) -> Self {
        Self {
            kind,
            required_signers: required_signers.into_iter().collect(),
        }
    }

    pub(crate) fn write_canonical(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.kind.to_string().as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(&(self.required_signers.len() as u32).to_le_bytes());
        for signer in &self.required_signers {
            buf.extend_from_slice(signer.key_hash());
        }
    }
}

// ---------------------------------------------------------------------------
// TimeWindow
// ---------------------------------------------------------------------------

/// Half-open validity interval `[from_ms, until_ms)` in Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from_ms: i64,
    pub until_ms: i64,
}

impl TimeWindow {
    /// Window opening at `start` and lasting `width`.
    pub fn starting_at(start: DateTime<Utc>, width: Duration) -> Self {
        let from_ms = start.timestamp_millis();
        let width_ms = i64::try_from(width.as_millis()).unwrap_or(i64::MAX);
        Self {
            from_ms,
            until_ms: from_ms.saturating_add(width_ms),
        }
    }

    /// Window opening now.
    pub fn from_now(width: Duration) -> Self {
        Self::starting_at(Utc::now(), width)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let ms = instant.timestamp_millis();
        self.from_ms <= ms && ms < self.until_ms
    }
}
