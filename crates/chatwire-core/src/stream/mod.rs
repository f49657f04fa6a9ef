//! Streaming buffer module.
//!
//! # Module Structure
//!
//! - `debounce`: single-slot `Debounce` primitive
//! - `buffer`: `StreamBuffer`, per-key text accumulation and throttled rendering

mod buffer;
mod debounce;

pub use buffer::{AppendOutcome, MessageState, RenderedFrame, StreamBuffer, StreamKey};
pub use debounce::Debounce;
