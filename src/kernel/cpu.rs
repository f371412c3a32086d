use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use log::warn;

use super::{Directive, Event, ProcessId};

use crate::workload::Workload;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Gate {
    Paused,
    Running,
    Retired,
}

type SharedGate = Arc<(Mutex<Gate>, Condvar)>;

/// One thread per simulated process. A unit only makes progress while the
/// kernel has opened its gate; otherwise it sleeps on a condvar.
struct ExecutionUnit {
    gate: SharedGate,
    handle: Option<JoinHandle<()>>,
}

/// The set of execution units, addressed by process id.
pub(crate) struct Cpu {
    units: Vec<ExecutionUnit>,
}

impl Cpu {
    pub fn new<F>(process_count: usize, mut workload_for: F, events: Sender<Event>) -> Cpu
    where
        F: FnMut(ProcessId) -> Box<dyn Workload>,
    {
        let units = (0..process_count)
            .map(|index| {
                let pid = ProcessId(index);
                let gate: SharedGate = Arc::new((Mutex::new(Gate::Paused), Condvar::new()));

                let gate_clone = gate.clone();
                let events_clone = events.clone();
                let workload = workload_for(pid);

                let handle = thread::Builder::new()
                    .name(format!("process-{pid}"))
                    .spawn(move || Cpu::cycle(pid, workload, &gate_clone, &events_clone))
                    .map_err(|err| warn!("Failed to spawn process {}: {}", pid, err))
                    .ok();

                ExecutionUnit { gate, handle }
            })
            .collect();

        Cpu { units }
    }

    /// Delivers a directive to the unit it names. Timer directives are not
    /// for the cpu and are ignored here.
    pub fn apply(&self, directive: Directive) {
        let (pid, next) = match directive {
            Directive::Resume(pid) => (pid, Gate::Running),
            Directive::Pause(pid) => (pid, Gate::Paused),
            Directive::Retire(pid) => (pid, Gate::Retired),
            Directive::RearmTimer => return,
        };

        match self.units.get(pid.index()) {
            Some(unit) => Cpu::set_gate(&unit.gate, next),
            None => warn!("Directive {:?} for unknown process {}.", directive, pid),
        }
    }

    /// Retires every unit and waits for the threads to exit.
    pub fn shutdown(mut self) {
        for unit in &self.units {
            Cpu::set_gate(&unit.gate, Gate::Retired);
        }

        for unit in &mut self.units {
            if let Some(handle) = unit.handle.take() {
                if handle.join().is_err() {
                    warn!("An execution unit panicked.");
                }
            }
        }
    }

    fn cycle(
        pid: ProcessId,
        mut workload: Box<dyn Workload>,
        gate: &SharedGate,
        events: &Sender<Event>,
    ) {
        while Cpu::await_resume(gate) {
            let mut requested = None;
            workload.run(pid, &mut |device| requested = Some(device));

            // Suspend before telling the kernel, so the unit cannot run
            // another step while the block request is in flight.
            if requested.is_some() {
                Cpu::pause_self(gate);
            }

            if events.send(Event::Executed(pid)).is_err() {
                break;
            }
            if let Some(device) = requested {
                if events.send(Event::BlockRequest { pid, device }).is_err() {
                    break;
                }
            }
        }
    }

    /// Blocks until the gate is open. Returns `false` once retired.
    fn await_resume(gate: &SharedGate) -> bool {
        let (lock, condvar) = &**gate;
        let mut state = Cpu::lock(lock);

        while *state == Gate::Paused {
            state = condvar.wait(state).unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        *state == Gate::Running
    }

    fn pause_self(gate: &SharedGate) {
        let (lock, _) = &**gate;
        let mut state = Cpu::lock(lock);

        if *state == Gate::Running {
            *state = Gate::Paused;
        }
    }

    fn set_gate(gate: &SharedGate, next: Gate) {
        let (lock, condvar) = &**gate;
        let mut state = Cpu::lock(lock);

        // Retired is final.
        if *state != Gate::Retired {
            *state = next;
            condvar.notify_all();
        }
    }

    fn lock(lock: &Mutex<Gate>) -> MutexGuard<'_, Gate> {
        lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::unbounded;

    use super::*;

    use crate::kernel::DeviceId;

    struct Step;

    impl Workload for Step {
        fn run(&mut self, _pid: ProcessId, _on_block_request: &mut dyn FnMut(DeviceId)) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    struct BlockOnSecondDevice;

    impl Workload for BlockOnSecondDevice {
        fn run(&mut self, _pid: ProcessId, on_block_request: &mut dyn FnMut(DeviceId)) {
            on_block_request(DeviceId(1));
        }
    }

    const QUIET: Duration = Duration::from_millis(50);

    #[test]
    fn test_cpu_paused_unit_does_not_run() {
        let (tx, rx) = unbounded();
        let cpu = Cpu::new(2, |_| Box::new(Step), tx);

        assert!(rx.recv_timeout(QUIET).is_err());

        cpu.shutdown();
    }

    #[test]
    fn test_cpu_resume_then_pause() {
        let (tx, rx) = unbounded();
        let cpu = Cpu::new(2, |_| Box::new(Step), tx);

        cpu.apply(Directive::Resume(ProcessId(1)));
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(Event::Executed(ProcessId(1))));

        cpu.apply(Directive::Pause(ProcessId(1)));
        // At most the step in flight completes after the pause.
        while rx.recv_timeout(QUIET).is_ok() {}
        assert!(rx.recv_timeout(QUIET).is_err());

        cpu.shutdown();
    }

    #[test]
    fn test_cpu_block_request_suspends_unit() {
        let (tx, rx) = unbounded();
        let cpu = Cpu::new(1, |_| Box::new(BlockOnSecondDevice), tx);

        cpu.apply(Directive::Resume(ProcessId(0)));

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(Event::Executed(ProcessId(0))));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)),
            Ok(Event::BlockRequest {
                pid: ProcessId(0),
                device: DeviceId(1)
            })
        );
        assert!(rx.recv_timeout(QUIET).is_err());

        cpu.shutdown();
    }

    #[test]
    fn test_cpu_retired_unit_ignores_resume() {
        let (tx, rx) = unbounded();
        let cpu = Cpu::new(1, |_| Box::new(Step), tx);

        cpu.apply(Directive::Retire(ProcessId(0)));
        cpu.apply(Directive::Resume(ProcessId(0)));

        assert!(rx.recv_timeout(QUIET).is_err());

        cpu.shutdown();
    }
}
