//! Bidirectional clipboard synchronization engine.
//!
//! Bridges the X selection adapter and the framed peer stream. A payload
//! travels in exactly one direction per ownership change; the two-slot
//! echo-guard suppresses both the echo of just-received content and the
//! duplicate notifications that CLIPBOARD and PRIMARY produce when they
//! change together.

pub mod engine;
pub mod error;
pub mod guard;
pub mod poll;
pub mod runner;

pub use engine::{Flow, Selections, SyncEngine};
pub use error::{EngineError, Result};
pub use guard::{fingerprint, EchoGuard};
pub use runner::{run_sync_loop, Termination, POLL_INTERVAL};
