//! Record export (CSV and JSON).

mod records;

pub use records::*;
