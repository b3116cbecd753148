pub mod memory;
pub mod traits;

pub use memory::InMemoryTraceStore;
pub use traits::TraceStore;
