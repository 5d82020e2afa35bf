pub mod config;
pub mod market;
pub mod negotiation;
pub mod output;
pub mod scoring;
pub mod server;
pub mod solver;
pub mod types;
