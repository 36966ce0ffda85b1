//! g2p Core
//!
//! Core types for the g2p go-to-production verification pipeline.
//!
//! This crate contains:
//! - Domain types: Pipeline, State, Checker and the lifecycle tracking they share
//! - Descriptor: loading of the YAML pipeline descriptor into the domain model

pub mod descriptor;
pub mod domain;
