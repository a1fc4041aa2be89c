//! SkillNet Core - Shared identity and profile types.
//!
//! This crate provides the domain types used by every SkillNet component:
//! - `client` - Identity store, API adapter, profile pipeline, session and follow state
//! - `cli` - Command-line driver over the client library
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no storage
//! access, no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Identifiers, profile models, and session state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
