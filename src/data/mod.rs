//! Data loading and dataset implementations
//!
//! Both loaders keep labels exactly as written in the file and implement
//! [`Dataset`](crate::core::Dataset), so their samples can be handed to a
//! trainer directly.

pub mod csv;
pub mod libsvm;

pub use self::csv::*;
pub use self::libsvm::*;
