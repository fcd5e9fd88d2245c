//! Data models shared by the engine and its collaborators.

mod delivery_key;
mod message;

pub use delivery_key::DeliveryKey;
pub use message::{ChannelId, Message, MessageId};
