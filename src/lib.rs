//! # Game Session Protocol
//!
//! Versioned, capability-gated game-session protocol engine: the binary
//! wire codec for client-to-server packets plus the client-side session
//! state machine that drives login, keepalives, movement, combat stance
//! and the in-game registries.
//!
//! ## Architecture
//! - [`features`]: protocol version → immutable capability set; the single
//!   place where version numbers mean anything
//! - [`protocol`]: the wire codec — [`protocol::command::ClientCommand`]
//!   in, capability-conditioned bytes out, and back
//! - [`session`]: the synchronous [`session::Session`] state machine,
//!   driven by [`session::SessionEvent`]s from the host's turn queue
//! - [`transport`]: the byte-stream boundary with a tokio TCP
//!   implementation and the post-login stream mode switches
//! - [`sink`]: host notification and environment traits
//!
//! ## Usage
//! ```no_run
//! use game_session_protocol::{
//!     config::SessionConfig,
//!     features::GameFeature,
//!     session::{Session, SessionEvent},
//! };
//!
//! # fn hosts() -> (Box<dyn game_session_protocol::transport::RsaCipher>,
//! #     Box<dyn game_session_protocol::session::timers::Scheduler>,
//! #     Box<dyn game_session_protocol::sink::EventSink>,
//! #     Box<dyn game_session_protocol::sink::Environment>,
//! #     Box<dyn game_session_protocol::sink::MapProbe>,
//! #     Box<dyn game_session_protocol::transport::Transport>) { unimplemented!() }
//! # fn main() -> Result<(), game_session_protocol::error::ProtocolError> {
//! let (rsa, scheduler, sink, environment, map, transport) = hosts();
//! let mut session = Session::new(
//!     SessionConfig::default(),
//!     rsa,
//!     scheduler,
//!     sink,
//!     environment,
//!     map,
//! );
//! session.set_protocol_version(1098, GameFeature::EXTENDED_CLIENT_PING)?;
//! session.login_world(Default::default(), transport)?;
//! // ... decode inbound frames and feed them in:
//! session.handle_event(SessionEvent::GameStart);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod features;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod transport;

pub use config::SessionConfig;
pub use error::{ProtocolError, Result};
pub use features::{FeatureSet, GameFeature};
pub use protocol::command::ClientCommand;
pub use protocol::types::{
    ChaseMode, Credentials, Direction, FightMode, MessageMode, Outfit, Position, PvpMode,
    VipEntry, VipStatus,
};
pub use session::{Session, SessionEvent, SessionState};
pub use sink::{Environment, EventSink, MapProbe, NullSink};
pub use transport::{RsaCipher, TcpTransport, TokioScheduler, Transport};
