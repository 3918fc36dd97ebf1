pub mod in_memory_transport;
pub mod observability;

pub use in_memory_transport::InMemoryTransport;
pub use observability::*;
