use super::{KernelError, KernelResult, ProcessControlBlock, ProcessId, ProcessState};

use crate::io::ProcessReport;

/// Authoritative state of every simulated process.
///
/// Only the scheduler holds a `ProcessTable`; the mutators below are the
/// sole way a process record changes.
pub(crate) struct ProcessTable {
    pcbs: Vec<ProcessControlBlock>,
}

impl ProcessTable {
    pub fn new(process_count: usize) -> ProcessTable {
        ProcessTable {
            pcbs: (0..process_count)
                .map(|index| ProcessControlBlock::new(ProcessId(index)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.pcbs.len()
    }

    pub fn get_pcb_for(&self, pid: ProcessId) -> KernelResult<&ProcessControlBlock> {
        self.pcbs
            .get(pid.index())
            .ok_or(KernelError::UnknownProcess(pid))
    }

    pub fn state_of(&self, pid: ProcessId) -> KernelResult<ProcessState> {
        Ok(self.get_pcb_for(pid)?.get_state())
    }

    /// Increments the program counter of a running process and returns the
    /// new value.
    pub fn advance(&mut self, pid: ProcessId) -> KernelResult<u64> {
        let pcb = self.pcb_mut(pid)?;

        if pcb.get_state() != ProcessState::Running {
            return Err(KernelError::InvalidTransition {
                pid,
                from: pcb.get_state(),
                to: ProcessState::Running,
            });
        }

        Ok(pcb.increment_program_counter())
    }

    pub fn set_state(&mut self, pid: ProcessId, state: ProcessState) -> KernelResult<()> {
        let pcb = self.pcb_mut(pid)?;
        let current = pcb.get_state();

        if !current.can_transition_to(state) {
            return Err(KernelError::InvalidTransition {
                pid,
                from: current,
                to: state,
            });
        }

        pcb.set_state(state);
        Ok(())
    }

    pub fn is_schedulable(&self, pid: ProcessId) -> bool {
        matches!(
            self.state_of(pid),
            Ok(ProcessState::Ready | ProcessState::Running)
        )
    }

    pub fn all_terminated(&self) -> bool {
        self.pcbs
            .iter()
            .all(|pcb| pcb.get_state() == ProcessState::Terminated)
    }

    pub fn running(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.pcbs
            .iter()
            .filter(|pcb| pcb.get_state() == ProcessState::Running)
            .map(ProcessControlBlock::get_id)
    }

    pub fn snapshot(&self) -> Vec<ProcessReport> {
        self.pcbs
            .iter()
            .map(|pcb| ProcessReport {
                id: pcb.get_id(),
                program_counter: pcb.get_program_counter(),
                state: pcb.get_state(),
            })
            .collect()
    }

    fn pcb_mut(&mut self, pid: ProcessId) -> KernelResult<&mut ProcessControlBlock> {
        self.pcbs
            .get_mut(pid.index())
            .ok_or(KernelError::UnknownProcess(pid))
    }
}
