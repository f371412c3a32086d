use std::fmt;

use super::DeviceId;

/// Stable, 0-indexed identifier of a simulated process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub usize);

impl ProcessId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Blocked(DeviceId),
    Terminated,
}

impl ProcessState {
    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// `Terminated` is absorbing, and only a running process may block
    /// itself or terminate.
    pub fn can_transition_to(self, next: ProcessState) -> bool {
        matches!(
            (self, next),
            (ProcessState::Ready, ProcessState::Running)
                | (ProcessState::Running, ProcessState::Ready)
                | (ProcessState::Running, ProcessState::Blocked(_))
                | (ProcessState::Running, ProcessState::Terminated)
                | (ProcessState::Blocked(_), ProcessState::Ready)
        )
    }

    pub fn blocked_on(self) -> Option<DeviceId> {
        match self {
            ProcessState::Blocked(device) => Some(device),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessState::Ready => write!(f, "Ready"),
            ProcessState::Running => write!(f, "Running"),
            ProcessState::Blocked(device) => write!(f, "Blocked({device})"),
            ProcessState::Terminated => write!(f, "Terminated"),
        }
    }
}

pub(crate) struct ProcessControlBlock {
    id: ProcessId,
    program_counter: u64,
    state: ProcessState,
}

impl ProcessControlBlock {
    pub fn new(id: ProcessId) -> ProcessControlBlock {
        ProcessControlBlock {
            id,
            program_counter: 0,
            state: ProcessState::Ready,
        }
    }

    pub fn get_id(&self) -> ProcessId {
        self.id
    }

    pub fn get_program_counter(&self) -> u64 {
        self.program_counter
    }

    pub fn get_state(&self) -> ProcessState {
        self.state
    }

    pub(super) fn increment_program_counter(&mut self) -> u64 {
        self.program_counter += 1;
        self.program_counter
    }

    pub(super) fn set_state(&mut self, state: ProcessState) {
        self.state = state;
    }
}
