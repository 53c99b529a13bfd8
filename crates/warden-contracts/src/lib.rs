//! # warden-contracts
//!
//! Shared types, configuration, and error contracts for the Warden policy
//! pipeline.
//!
//! Every crate in the workspace imports from here. No pipeline logic lives in
//! this crate, only data definitions, configuration loading, and the small
//! accessors that keep tagged types pleasant to use.

pub mod config;
pub mod conversation;
pub mod corpus;
pub mod decision;
pub mod error;
pub mod guard;
pub mod retrieval;
pub mod tool;
