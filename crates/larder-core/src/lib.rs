//! Larder Core
//!
//! This crate contains the utilities shared by the larder crates: hashed
//! collections, logging setup and optional profiling scopes.

pub mod alloc;
pub mod logging;
pub mod profiling;
