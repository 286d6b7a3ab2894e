//! kanjiquiz-core — Quiz session engine, frequency ranking, and sampling.
//!
//! This crate defines the data model, the collaborator traits a store must
//! implement, and the session state machine that drives a quiz. It performs
//! no I/O of its own.

pub mod error;
pub mod model;
pub mod ranking;
pub mod sampler;
pub mod session;
pub mod statistics;
pub mod traits;
