//! Port traits the domain talks to.

pub mod config_port;
pub mod history_port;
pub mod report_port;
