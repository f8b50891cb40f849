pub mod aggregate;
pub mod config;
pub mod history;
pub mod pipeline;
pub mod process;
pub mod sink;
