pub mod config;
pub mod ingest;
pub mod similar;
pub mod status;

pub use ingest::run_ingest;
pub use similar::run_similar;
pub use status::show_status;
