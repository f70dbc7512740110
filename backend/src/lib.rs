pub mod annotate;
pub mod cli;
pub mod codec;
pub mod config;
pub mod inference;
pub mod pipeline;
pub mod routes;
pub mod storage;
