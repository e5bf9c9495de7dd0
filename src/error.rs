//! Node-level error taxonomy: protocol framing, transport, and the
//! ledger's own validation/state/persistence errors composed into one
//! top-level type.

use thiserror::Error;

/// Malformed or unrecognized wire messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("could not parse message frame: {0}")]
    MalformedMessage(String),

    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
}

/// Peer connection failures; both variants always trigger reconnect
/// scheduling at the call site.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to dial {0}: {1}")]
    DialFailed(String, String),

    #[error("peer {0} closed the connection")]
    PeerClosed(String),
}

#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Ledger(#[from] ledger_core::LedgerError),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;
