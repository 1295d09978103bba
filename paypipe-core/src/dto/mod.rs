//! Data Transfer Objects for the HTTP API
//!
//! Request and response bodies exchanged between the server and its
//! clients. Domain types are reused directly where they already have
//! the right shape.

pub mod pipeline;
pub mod service;
pub mod spend;
