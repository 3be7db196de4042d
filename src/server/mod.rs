pub mod format;
mod tools;

pub use tools::{GetServerDetailsRequest, OutputFormat, Registry, SearchServersRequest};
