//! # fib-core
//!
//! Core utilities, configuration sources and error handling for the
//! federated identity bridge.
//!
//! This crate provides foundational types used across all other bridge
//! crates:
//!
//! - [`config`] - Key/value configuration sources (process environment or maps)
//! - [`error`] - The bridge-wide error type, mostly for configuration failures
//! - [`event`] - Structured security and audit events

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;

pub use config::{ConfigSource, ProcessEnv};
pub use error::{Error, Result};
pub use event::{AuthEvent, EventType};
