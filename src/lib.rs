pub mod catalog;
pub mod driver;
pub mod probe;
pub mod report;
pub mod reporter;
pub mod runner;
pub mod scheduler;
pub mod session;
pub mod utils;

// Re-export common items
pub use report::generate_report;
pub use runner::run_once;
pub use utils::config::Config;
