pub mod finding;
pub mod request;

pub use finding::*;
pub use request::*;
