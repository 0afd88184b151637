//! CLI command implementations

mod analytics;
mod config_gen;
mod links;

pub use analytics::*;
pub use config_gen::*;
pub use links::*;
