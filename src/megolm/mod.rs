//! Megolm group sessions: one sender ratchet shared with many receivers.

mod inbound;
mod message;
mod outbound;
mod ratchet;
mod session_key;

pub use inbound::{GroupDecryption, InboundGroupSession};
pub use outbound::OutboundGroupSession;
