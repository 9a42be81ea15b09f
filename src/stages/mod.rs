pub mod analyze;
pub mod cleanup;
pub mod ingest;

pub use analyze::*;
pub use cleanup::*;
pub use ingest::*;
