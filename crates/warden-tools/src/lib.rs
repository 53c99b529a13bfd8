//! # warden-tools
//!
//! The tools the reasoning model may call, and the registry that stands
//! between the model and them.
//!
//! - `registry`: `ToolRegistry`, the `ToolDispatcher` implementation. Every
//!   call is checked against the tool's JSON Schema and run under a timeout;
//!   every failure comes back as a typed `ToolError`.
//! - `builtin`: `employee_lookup`, `policy_search`, `approval_threshold_check`
//! - `directory`: the read-only employee directory
//! - `approval`: approval rules and most-specific-rule selection
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_tools::ToolRegistry;
//!
//! let registry = ToolRegistry::standard(directory, rules, index, &config)?;
//! let result = registry.dispatch(&call).await;
//! ```

pub mod approval;
pub mod builtin;
pub mod directory;
pub mod registry;

pub use approval::ApprovalRules;
pub use directory::EmployeeDirectory;
pub use registry::{Tool, ToolRegistry};
