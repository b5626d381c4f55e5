pub mod config;
pub mod document;
pub mod report;
pub mod verdict;

pub use config::Config;
pub use document::*;
pub use report::*;
pub use verdict::*;
