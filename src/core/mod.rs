//! # Core Wire Primitives
//!
//! Low-level byte-buffer reading and writing for the game wire format.
//!
//! ## Wire conventions
//! - All multi-byte integers are little-endian
//! - Strings are u16-length-prefixed raw bytes
//! - Positions are `x:u16, y:u16, z:u8`
//!
//! Packet *structure* (which fields exist and how wide they are) is decided
//! one level up by the capability-driven encoder/decoder in
//! [`crate::protocol`].

pub mod packet;
