pub mod event_bus;
pub mod transport;

pub use event_bus::{BusChannel, EventBus};
pub use transport::{BusTransport, MemoryTransport, RedisTransport};
