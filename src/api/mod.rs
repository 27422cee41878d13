//! Public surface: compiled converters and the host-facing sentinels.

pub mod converter;

pub use converter::{placeholder, ChainedConverter, Converter, ConverterBuilder, Outcome};

#[cfg(test)]
mod converter_test;
