//! CLI command implementations
//!
//! Every command returns a process exit code: 0 success, 1 rejected or not
//! routed, 2 configuration or input error, 4 connection error, 5 fatal error.

pub mod filters;
pub mod init;
pub mod lineage;
pub mod validate;
