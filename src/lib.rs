// ABOUTME: Library root for horsestrap - exposes the deployment core for testing.
// ABOUTME: The main binary is in main.rs.

pub mod backup;
pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod hooks;
pub mod output;
pub mod runtime;
pub mod types;
