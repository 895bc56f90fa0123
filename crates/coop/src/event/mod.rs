mod queue;
mod types;

pub use queue::{Distribution, NetworkQueues, PacketQueue};
pub use types::SessionEvent;
