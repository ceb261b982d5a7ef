//! Pipeline step plumbing
//!
//! - [`execution`] - [`StepExecution`], the persist-then-flush unit of work
//! - [`receiver_filter`] - [`ReceiverFilterStep`], one item against one receiver

pub mod execution;
pub mod receiver_filter;

pub use execution::StepExecution;
pub use receiver_filter::{ReceiverFilterResult, ReceiverFilterStep};
