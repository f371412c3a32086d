use super::{DeviceId, ProcessId, ProcessState};

pub type KernelResult<T> = Result<T, KernelError>;

/// Errors raised while applying an event to the kernel state.
///
/// None of these are fatal: the driver logs them and drops the event that
/// caused them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    #[error("process {pid}: invalid transition {from} -> {to}")]
    InvalidTransition {
        pid: ProcessId,
        from: ProcessState,
        to: ProcessState,
    },

    #[error("stale request from process {0}, which does not hold the cpu")]
    StaleRequest(ProcessId),

    #[error("process {pid} is already queued on device {device}")]
    AlreadyQueued { pid: ProcessId, device: DeviceId },

    #[error("unknown process {0}")]
    UnknownProcess(ProcessId),

    #[error("unknown device {0}")]
    UnknownDevice(DeviceId),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}
