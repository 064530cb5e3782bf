pub mod config;
pub mod error;
pub mod imx;
pub mod observability;
pub mod types;
