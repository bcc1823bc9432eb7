//! Kernel error type.

use thiserror::Error;

use agv_core::{ProcessId, SimTime};

/// Errors produced by `agv-kernel`.
///
/// Faults raised *inside* a process are not errors of the kernel: they are
/// recorded as [`ProcessFault`](crate::ProcessFault)s and the run continues.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("watchdog expired: next event at {next} is past the limit {limit}")]
    WatchdogExpired { limit: SimTime, next: SimTime },

    #[error("process {0} does not exist")]
    UnknownProcess(ProcessId),
}

pub type KernelResult<T> = Result<T, KernelError>;
