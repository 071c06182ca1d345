pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod model;
pub mod oracle;
pub mod pipeline;
pub mod stabilize;
pub mod stats;
pub mod summary;
pub mod util;
