pub mod config;
pub mod export;
pub mod history;
pub mod pipeline;
pub mod process;
pub mod schema;
pub mod source;
pub mod upload;
