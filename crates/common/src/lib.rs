//! Shared node plumbing that doesn't belong to any one subsystem.

pub mod logging;
