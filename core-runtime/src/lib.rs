//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the anime tracker core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! Every other crate in the workspace depends on this one for its logging
//! conventions, validated configuration and the event broadcast channel.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
