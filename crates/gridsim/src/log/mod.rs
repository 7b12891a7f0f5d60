//! Structured trace of the simulation.

#[macro_use]
mod util;

pub mod init;
pub mod log_entry;
pub mod logger;

pub use log_entry::LogEntry;
pub use logger::Logger;
