//! Core domain types
//!
//! This module contains the core domain structures used across PayPipe crates.
//! These types are shared between the server (which plans, executes and
//! records pipelines) and the client/CLI (which display them).

pub mod event;
pub mod pipeline;
pub mod plan;
pub mod service;
pub mod spend;
