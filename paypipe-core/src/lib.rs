//! PayPipe Core
//!
//! Core types and abstractions for the PayPipe paid-pipeline system.
//!
//! This crate contains:
//! - Domain types: Core business entities (ServiceDescriptor, TaskPlan, StepResult, etc.)
//! - DTOs: Data transfer objects for the HTTP API

pub mod domain;
pub mod dto;
