//! # Wire Codec
//!
//! The capability-conditioned packet layer: opcode table, shared value
//! types, the outbound command model, and the encoder/decoder pair.
//!
//! The codec is stateless given a [`crate::features::FeatureSet`]; the
//! login packet's transport side effects (checksum, stream cipher,
//! compression, sequencing) are performed by the session, not here.

pub mod command;
pub mod decode;
pub mod encode;
pub mod opcodes;
pub mod types;
