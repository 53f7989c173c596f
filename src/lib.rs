//! Deve Library
//!
//! Drives the local container engine over its Unix socket to issue TLS
//! certificates for locally hosted sites without leaving the web server
//! down.

pub mod config;
pub mod engine;
pub mod error;
pub mod issuance;
pub mod validation;
