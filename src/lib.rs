//! Benchmark bulk writes into an object's key-value map.
//!
//! The benchmark pushes a number of synthetic key-value pairs into the
//! map of a single object in an object store, in batches of a given
//! size, with each batch applied as one atomic operation, and reports
//! the wall-clock time the whole run took. This crate provides the
//! benchmark, the store sessions it runs against, and a small HTTP
//! object store server.

#![deny(missing_docs)]

pub mod accumulated_time;
pub mod benchmark;
pub mod config;
pub mod error;
pub mod generator;
pub mod kvpair;
pub mod objectstore;
pub mod performance;
pub mod progress;
pub mod runner;
pub mod server;
pub mod session;
pub mod timing;
