pub mod api;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod execution;
pub mod generation;
pub mod schemas;
pub mod shutdown;
pub mod state;
pub mod storage;
