//! X11 selection adapter.
//!
//! Owns the display connection and a 1×1 unmapped window that acts as
//! selection owner and event sink. Ownership changes on CLIPBOARD and
//! PRIMARY are observed through the XFixes extension, which delivers a
//! true event on every owner change instead of requiring polling.

pub mod adapter;
pub mod error;
pub mod event;

pub use adapter::{SelectionAdapter, CONVERT_TIMEOUT};
pub use error::{Result, SelectionError};
pub use event::{ConversionRequest, Selection, SelectionEvent};
