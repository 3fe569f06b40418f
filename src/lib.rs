pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod parsers;
pub mod services;

pub use errors::{ScarfError, SwampError};
