//! Vector index implementations.
pub mod forest;
