//! The clamd wire protocol.
//!
//! - [`frame`] - INSTREAM chunk framing and command literals
//! - [`guard`] - Client-side stream size ceiling
//! - [`session`] - Per-connection state machine

pub mod frame;
pub mod guard;
pub mod session;

pub use frame::CHUNK_SIZE;
pub use guard::SizeGuard;
pub use session::{run_command, run_instream, InstreamOutcome, SessionState, StreamSession};
