//! The `utils` module provides shared definitions used across `termchat`:
//! the crate error type and logging setup.

pub mod error;
pub mod logging;
