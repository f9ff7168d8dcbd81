//! Type definitions

pub mod address;
pub mod checkpoint;

pub use address::*;
pub use checkpoint::*;
