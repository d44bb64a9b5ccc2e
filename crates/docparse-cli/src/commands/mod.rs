//! Command implementations for docparse

pub mod parse;

pub use parse::{parse, ParseArgs, Summary};
