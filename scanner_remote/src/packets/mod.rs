//! JSON envelopes exchanged with the remote controller.
//!
//! Every frame is a text frame holding one object with a `type`
//! discriminator. Outbound messages are a closed set; inbound ones are
//! decoded leniently so that a newer remote can add message types without
//! breaking this client.

mod client_message;
mod server_message;

pub use client_message::*;
pub use server_message::*;
