pub mod assemble;
pub mod chunk;
pub mod chunker;
pub mod coalesce;
pub mod config;
pub mod dispatcher;
pub mod fetch;
pub mod index;
pub mod ingest;
pub mod manifest;
pub mod pipeline;
pub mod pool;
pub mod queue;
pub mod retrieve;

#[cfg(test)]
mod tests;
#[cfg(test)]
mod testutil;
