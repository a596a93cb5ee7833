//! # Transport Boundary
//!
//! The session core is transport-agnostic: it talks to the wire through
//! [`Transport`] and seals login regions through [`RsaCipher`]. A tokio TCP
//! implementation ships in [`tcp`]; tests substitute in-memory doubles.

use bytes::Bytes;

use crate::error::Result;

pub mod tcp;

pub use tcp::{TcpTransport, TokioScheduler};

/// Outbound byte stream plus the post-login mode switches.
///
/// Sends are fire-and-forget: a successful return means the frame was
/// queued, not acknowledged. Mode switches apply to every frame queued
/// after the call, which is why the session flips them immediately after
/// queueing the login packet and never again.
pub trait Transport {
    fn is_connected(&self) -> bool;

    /// Queue one frame for delivery.
    fn send(&self, frame: Bytes) -> Result<()>;

    /// Frame checksums on every subsequent frame.
    fn enable_checksum(&self);

    /// Symmetric stream cipher keyed with the login packet's material.
    fn enable_encryption(&self, key: [u32; 4]);

    /// Payload compression.
    fn enable_compression(&self);

    /// Per-frame sequence numbering.
    fn enable_sequencing(&self);

    fn disconnect(&self);
}

/// Asymmetric cipher used to seal the login packet's protected regions.
///
/// Supplied by the host; the engine treats it as an opaque primitive and
/// only relies on `encrypt_block` operating in place on exactly
/// `block_size` bytes.
pub trait RsaCipher {
    fn block_size(&self) -> usize;

    fn encrypt_block(&self, block: &mut [u8]) -> Result<()>;
}
