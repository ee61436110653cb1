pub mod aggregator;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod query;
pub mod store;
pub mod terminal;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;
