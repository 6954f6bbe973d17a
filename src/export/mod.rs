//! Record export

pub mod json;

pub use json::{read_record, write_record};
