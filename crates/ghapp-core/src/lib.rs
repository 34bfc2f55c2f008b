//! Core traits, errors, and configuration for ghapp-tools.
//!
//! This crate provides the foundational abstractions shared by the GitHub App
//! client and the command-line tool.

pub mod config;
pub mod error;
pub mod transport;

pub use config::{AppConfig, Config};
pub use error::{reject_control_characters, BaseUrlError, Error, Result};
pub use transport::{SharedTransport, Transport};
