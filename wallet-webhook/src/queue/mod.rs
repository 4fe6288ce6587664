//! Event queue: the single hand-off point between ingress and dispatch.
//!
//! ## Architecture
//!
//! ```text
//! Wallet service → Ingress → EventQueue (bounded) → Dispatch workers → Handlers
//! ```

pub mod channel;
pub mod types;

pub use channel::{EnqueueError, EventQueue};
pub use types::RawEvent;
