pub mod config;
pub mod timeframe;
