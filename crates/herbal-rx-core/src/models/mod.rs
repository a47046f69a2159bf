//! Domain models for herbal-rx.

mod prescription;
mod receipt;

pub use prescription::*;
pub use receipt::*;
