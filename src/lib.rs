//! face-login library crate.
//!
//! A terminal client for a face recognition login service: camera session
//! management, identity validation, the service's HTTP contract, and the
//! login flow state machine tying them together.

pub mod camera;
pub mod config;
pub mod error;
pub mod flow;
pub mod identity;
pub mod service;

pub use error::AuthError;
