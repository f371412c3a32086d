use log::{debug, info};

use super::{
    DeviceId, DeviceQueues, Directive, Event, KernelError, KernelResult, ProcessId,
    ProcessState, ProcessTable,
};

use crate::io::ProcessReport;

/// Round-robin scheduler. Owns the process table and the device queues and
/// is the only place either of them changes.
///
/// Every handler runs to completion and returns the directives the driver
/// must deliver. The scheduler itself never touches threads or timers, so
/// whoever calls it is responsible for calling it from a single thread.
pub(crate) struct ShortTermScheduler {
    processes: ProcessTable,
    devices: DeviceQueues,
    current_process: Option<ProcessId>,
    /// Last process that held the cpu. Round-robin resumes scanning after it,
    /// including after an idle period.
    last_dispatched: Option<ProcessId>,
    max_program_counter: u64,
}

impl ShortTermScheduler {
    pub fn new(
        process_count: usize,
        device_count: usize,
        max_program_counter: u64,
    ) -> ShortTermScheduler {
        ShortTermScheduler {
            processes: ProcessTable::new(process_count),
            devices: DeviceQueues::new(device_count),
            current_process: None,
            last_dispatched: None,
            max_program_counter,
        }
    }

    pub fn current_process(&self) -> Option<ProcessId> {
        self.current_process
    }

    pub fn is_finished(&self) -> bool {
        self.processes.all_terminated()
    }

    pub fn report(&self) -> Vec<ProcessReport> {
        self.processes.snapshot()
    }

    /// Dispatches the first process and arms the timer.
    pub fn start(&mut self) -> KernelResult<Vec<Directive>> {
        let mut directives = Vec::new();

        if let Some(pid) = self.dispatch_next()? {
            info!("Process {} started.", pid);
            directives.push(Directive::Resume(pid));
        }
        directives.push(Directive::RearmTimer);

        Ok(directives)
    }

    pub fn handle(&mut self, event: Event) -> KernelResult<Vec<Directive>> {
        if self.is_finished() {
            return Ok(Vec::new());
        }

        match event {
            Event::TimerTick => self.on_timer_tick(),
            Event::DeviceComplete(device) => self.on_device_complete(device),
            Event::Executed(pid) => self.on_executed(pid),
            Event::BlockRequest { pid, device } => self.on_block_request(pid, device),
            Event::Shutdown => Ok(Vec::new()),
        }
    }

    pub fn on_timer_tick(&mut self) -> KernelResult<Vec<Directive>> {
        let mut directives = Vec::new();

        let preempted = match self.current_process.take() {
            Some(pid) if self.processes.state_of(pid)? == ProcessState::Running => {
                self.processes.set_state(pid, ProcessState::Ready)?;
                Some(pid)
            }
            _ => None,
        };

        let next = self.dispatch_next()?;

        match (preempted, next) {
            // The unit may have closed its own gate for a block request the
            // kernel rejected, so the gate is reopened even without a switch.
            (Some(old), Some(new)) if old == new => {
                debug!("Process {} keeps the cpu, no other process is ready.", new);
                directives.push(Directive::Resume(new));
            }
            _ => {
                if let Some(old) = preempted {
                    info!("Process {} interrupted.", old);
                    directives.push(Directive::Pause(old));
                }
                if let Some(new) = next {
                    info!("Process {} resumed.", new);
                    directives.push(Directive::Resume(new));
                }
            }
        }

        directives.push(Directive::RearmTimer);
        Ok(directives)
    }

    pub fn on_block_request(
        &mut self,
        pid: ProcessId,
        device: DeviceId,
    ) -> KernelResult<Vec<Directive>> {
        if self.current_process != Some(pid) {
            return Err(KernelError::StaleRequest(pid));
        }

        // Validate the transition before queueing so a rejected request
        // leaves both structures untouched.
        let blocked = ProcessState::Blocked(device);
        let from = self.processes.state_of(pid)?;
        if !from.can_transition_to(blocked) {
            return Err(KernelError::InvalidTransition {
                pid,
                from,
                to: blocked,
            });
        }

        self.devices.enqueue(device, pid)?;
        self.processes.set_state(pid, blocked)?;
        self.current_process = None;
        info!("Process {} blocked on device {}.", pid, device);

        let mut directives = vec![Directive::Pause(pid)];
        if let Some(next) = self.dispatch_next()? {
            info!("Process {} resumed.", next);
            directives.push(Directive::Resume(next));
        }
        directives.push(Directive::RearmTimer);

        Ok(directives)
    }

    pub fn on_device_complete(&mut self, device: DeviceId) -> KernelResult<Vec<Directive>> {
        match self.devices.front(device)? {
            Some(pid) => {
                // Only leave the queue once the state change went through.
                self.processes.set_state(pid, ProcessState::Ready)?;
                self.devices.dequeue_front(device)?;
                info!("Process {} released from device {}.", pid, device);
            }
            None => debug!("Device {} completed with nobody waiting.", device),
        }

        Ok(Vec::new())
    }

    pub fn on_executed(&mut self, pid: ProcessId) -> KernelResult<Vec<Directive>> {
        if self.current_process != Some(pid) {
            return Err(KernelError::StaleRequest(pid));
        }

        let program_counter = self.processes.advance(pid)?;
        debug!("Process {} executing, PC: {}", pid, program_counter);

        if program_counter < self.max_program_counter {
            return Ok(Vec::new());
        }

        self.processes.set_state(pid, ProcessState::Terminated)?;
        self.current_process = None;
        info!("Process {} finished.", pid);

        let mut directives = vec![Directive::Retire(pid)];
        if self.is_finished() {
            info!("All processes finished.");
            return Ok(directives);
        }

        if let Some(next) = self.dispatch_next()? {
            info!("Process {} resumed.", next);
            directives.push(Directive::Resume(next));
        }
        directives.push(Directive::RearmTimer);

        Ok(directives)
    }

    /// Checks the cross-structure invariants: at most one running process,
    /// which must be the current one, and every queued process blocked on
    /// the queue it sits in.
    pub fn check_invariants(&self) -> KernelResult<()> {
        let running: Vec<ProcessId> = self.processes.running().collect();
        if running.len() > 1 {
            return Err(KernelError::ProtocolViolation(format!(
                "{} processes running at once: {:?}",
                running.len(),
                running
            )));
        }
        if running.first().copied() != self.current_process {
            return Err(KernelError::ProtocolViolation(format!(
                "current process {:?} does not match running set {:?}",
                self.current_process, running
            )));
        }

        for (device, pid) in self.devices.iter() {
            let state = self.processes.state_of(pid)?;
            if state != ProcessState::Blocked(device) {
                return Err(KernelError::ProtocolViolation(format!(
                    "process {} queued on {} while {}",
                    pid, device, state
                )));
            }
        }

        Ok(())
    }

    /// Selects the first ready process after the last dispatched one, in
    /// cyclic order, and makes it the running process.
    fn dispatch_next(&mut self) -> KernelResult<Option<ProcessId>> {
        let process_count = self.processes.len();
        let start = self.last_dispatched.map_or(0, |pid| pid.index() + 1);

        let next = (0..process_count)
            .map(|offset| ProcessId((start + offset) % process_count))
            .find(|&pid| self.processes.is_schedulable(pid));

        match next {
            Some(pid) => {
                self.processes.set_state(pid, ProcessState::Running)?;
                self.last_dispatched = Some(pid);
            }
            None => info!("No process is ready, cpu idle."),
        }

        self.current_process = next;
        Ok(next)
    }
}
