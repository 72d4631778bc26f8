pub mod core;
pub mod engine;

pub use core::messages;
