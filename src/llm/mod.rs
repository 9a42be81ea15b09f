pub mod client;
pub mod normalizer;
pub mod prompts;
#[cfg(test)]
pub(crate) mod scripted;

pub use client::*;
pub use normalizer::*;
pub use prompts::*;
