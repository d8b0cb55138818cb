pub mod aggregate;
pub mod chart;
pub mod cleaner;
pub mod dataset_store;
pub mod export;
pub mod filter;
pub mod inference;
pub mod plan;
pub mod reader;
pub mod stats;
pub mod time_aggregate;
pub mod utils;
