//! # Error Types
//!
//! All error variants that can occur while driving a game session,
//! from login preconditions to wire-level decode failures.
//!
//! ## Error Categories
//! - **Precondition errors**: login attempted in the wrong lifecycle state
//! - **Protocol limit errors**: oversized walk paths and talk messages
//! - **Connection errors**: transport failures and remote disconnects
//! - **Codec errors**: malformed inbound frames, packing overflows
//!
//! All errors implement `std::error::Error` for interoperability.

use std::io;
use thiserror::Error;

/// Primary error type for all session and codec operations.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A login or replay was attempted while a session is already
    /// authenticating or in game.
    #[error("already online or logging into a world")]
    AlreadyOnline,

    /// A login or replay was attempted before a protocol version was
    /// negotiated.
    #[error("a game protocol version must be negotiated before logging in")]
    ProtocolNotConfigured,

    /// A game action was attempted outside a live, entered session.
    #[error("no active game session for this action")]
    NotInGame,

    /// An outbound action exceeded a hard protocol limit and was dropped
    /// locally without any wire traffic.
    #[error("protocol limit exceeded: {0}")]
    ProtocolLimit(String),

    /// Transport failure or remote disconnect; always followed by a full
    /// session reset.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("connection closed")]
    ConnectionClosed,

    /// An outbound call failed the bot-protection filter and was dropped.
    #[error("bot protection violation: call did not originate from a trusted context")]
    BotProtectionViolation,

    /// Inbound bytes could not be decoded into a known packet.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Leading byte of an inbound frame did not match any known packet.
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    /// The RSA-protected region grew past the cipher block size; the frame
    /// must be aborted rather than sent corrupt.
    #[error("packing overflow: region of {region} bytes exceeds cipher block of {block} bytes")]
    PackingOverflow { region: usize, block: usize },

    /// Cipher primitive reported a failure while sealing a login region.
    #[error("encryption failed: {0}")]
    EncryptionFailure(String),

    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl ProtocolError {
    /// Truncated-buffer decode failure with a uniform message shape.
    pub(crate) fn truncated(what: &str) -> Self {
        ProtocolError::MalformedMessage(format!("truncated buffer while reading {what}"))
    }
}
