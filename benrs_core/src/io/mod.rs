//! Module for reading and writing problems
pub mod vlp_file;
