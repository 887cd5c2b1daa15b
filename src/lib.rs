pub mod api;
pub mod args;
pub mod collector;
pub mod discovery;
pub mod error;
pub mod merger;
pub mod output;
pub mod record;
pub mod sample;
pub mod scan;
pub mod table;
pub mod util;

pub use error::{Result, ScanError};
