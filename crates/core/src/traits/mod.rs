pub mod scheduler;
pub mod transport;

pub use scheduler::*;
pub use transport::*;
