pub mod aggregator;
pub mod cli;
pub mod display;
pub mod fetcher;
mod fetcher_impls;
pub mod metrics;
pub mod normalizer;
pub mod orchestrator;
pub mod scheduler;
pub mod scoring_table;
