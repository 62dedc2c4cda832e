pub mod config;
pub mod detect;
pub mod error;
pub mod io;
pub mod merge;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod optimize;
pub mod pipeline;
pub mod store;
pub mod vocabulary;

pub use error::{Result, ToolError};
