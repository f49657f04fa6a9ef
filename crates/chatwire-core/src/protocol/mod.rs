//! Wire protocol module.
//!
//! JSON envelopes exchanged over the duplex channel.
//!
//! # Module Structure
//!
//! - `inbound`: backend -> client events (`InboundEvent`)
//! - `outbound`: client -> backend intents (`OutboundEnvelope`, `ChatMode`)

mod inbound;
mod outbound;

pub use inbound::{InboundEvent, payload_text};
pub use outbound::{ChatMode, OutboundEnvelope};
