//! System-level modules: logging setup, server mode and shutdown handling

pub mod logging;
pub mod server;
pub mod shutdown;
