// src/lib.rs

//! Licitation Sync Library
//!
//! Incremental synchronization of a public procurement ATOM feed into a
//! record store, with domain events derived from each change.

pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
mod testing;
