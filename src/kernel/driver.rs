use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;

use crate::config::{Config, ConfigError};
use crate::io::ProcessReport;
use crate::workload::Workload;

/// Asks a running simulation to stop. Cloneable and usable from any thread,
/// including a signal handler.
#[derive(Clone)]
pub struct StopHandle {
    events_tx: Sender<Event>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.events_tx.send(Event::Shutdown);
    }
}

/// Owns the event channel and is its only consumer. Every scheduling
/// decision happens on the thread that calls [`Driver::start`].
pub struct Driver {
    config: Config,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
}

impl Driver {
    pub fn new(config: Config) -> Result<Driver, ConfigError> {
        config.validate()?;
        let (events_tx, events_rx) = unbounded();

        Ok(Driver {
            config,
            events_tx,
            events_rx,
        })
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            events_tx: self.events_tx.clone(),
        }
    }

    /// Runs the simulation until every process terminates or a stop is
    /// requested, then returns the final state of every process.
    pub fn start<F>(self, workload_for: F) -> Vec<ProcessReport>
    where
        F: FnMut(ProcessId) -> Box<dyn Workload>,
    {
        let config = &self.config;
        info!(
            "Starting the kernel with {} processes and {} devices.",
            config.process_count, config.device_count
        );

        let mut sts = ShortTermScheduler::new(
            config.process_count,
            config.device_count,
            config.max_program_counter,
        );
        let cpu = Cpu::new(config.process_count, workload_for, self.events_tx.clone());
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let interrupts = InterruptSource::start(
            config.time_slice(),
            config.device_poll_interval(),
            config.completion_probabilities(),
            rng,
            self.events_tx.clone(),
        );

        Driver::deliver(sts.start(), &cpu, &interrupts);

        for event in self.events_rx.iter() {
            if event == Event::Shutdown {
                match sts.current_process() {
                    Some(pid) => info!("Stop requested while process {} held the cpu.", pid),
                    None => info!("Stop requested while the cpu was idle."),
                }
                break;
            }

            Driver::deliver(sts.handle(event), &cpu, &interrupts);

            if let Err(violation) = sts.check_invariants() {
                error!("{}", violation);
            }
            if sts.is_finished() {
                break;
            }
        }

        interrupts.stop();
        cpu.shutdown();
        info!("Kernel stopped.");

        sts.report()
    }

    fn deliver(result: KernelResult<Vec<Directive>>, cpu: &Cpu, interrupts: &InterruptSource) {
        let directives = match result {
            Ok(directives) => directives,
            Err(KernelError::StaleRequest(pid)) => {
                debug!("Dropping stale request from process {}.", pid);
                return;
            }
            Err(err) => {
                warn!("Dropping event: {}", err);
                return;
            }
        };

        for directive in directives {
            match directive {
                Directive::RearmTimer => interrupts.rearm_timer(),
                directive => cpu.apply(directive),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use super::*;

    struct Burst;

    impl Workload for Burst {
        fn run(&mut self, _pid: ProcessId, _on_block_request: &mut dyn FnMut(DeviceId)) {
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Blocks on its own device every `every` steps and records the order in
    /// which processes ran.
    struct Periodic {
        every: u32,
        steps: u32,
        trace: Arc<Mutex<Vec<ProcessId>>>,
    }

    impl Workload for Periodic {
        fn run(&mut self, pid: ProcessId, on_block_request: &mut dyn FnMut(DeviceId)) {
            thread::sleep(Duration::from_millis(1));
            self.trace.lock().unwrap().push(pid);

            self.steps += 1;
            if self.steps % self.every == 0 {
                on_block_request(DeviceId(pid.index() % 2));
            }
        }
    }

    /// Asks for a device that does not exist on its first step only.
    struct BadRequest {
        requested: bool,
    }

    impl Workload for BadRequest {
        fn run(&mut self, _pid: ProcessId, on_block_request: &mut dyn FnMut(DeviceId)) {
            thread::sleep(Duration::from_millis(1));
            if !self.requested {
                self.requested = true;
                on_block_request(DeviceId(5));
            }
        }
    }

    fn fast_config() -> Config {
        Config {
            process_count: 3,
            device_count: 2,
            time_slice_ms: 20,
            step_ms: 1,
            io_request_probability: 0.0,
            device_poll_interval_ms: 5,
            completion_probabilities: vec![1.0, 1.0],
            max_program_counter: 10,
            seed: Some(3),
        }
    }

    #[test]
    fn test_driver_rejects_invalid_config() {
        let config = Config {
            device_count: 0,
            ..fast_config()
        };
        assert!(matches!(Driver::new(config), Err(ConfigError::NoDevices)));
    }

    #[test]
    fn test_driver_runs_until_all_terminated() {
        let driver = Driver::new(fast_config()).unwrap();

        let reports = driver.start(|_| Box::new(Burst));

        assert_eq!(reports.len(), 3);
        for report in reports {
            assert_eq!(report.state, ProcessState::Terminated);
            assert_eq!(report.program_counter, 10);
        }
    }

    #[test]
    fn test_driver_blocking_processes_still_terminate() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let driver = Driver::new(fast_config()).unwrap();

        let trace_clone = trace.clone();
        let reports = driver.start(move |_| {
            Box::new(Periodic {
                every: 3,
                steps: 0,
                trace: trace_clone.clone(),
            })
        });

        for report in &reports {
            assert_eq!(report.state, ProcessState::Terminated);
            assert_eq!(report.program_counter, 10);
        }
        let trace = trace.lock().unwrap();
        for index in 0..3 {
            assert!(trace.contains(&ProcessId(index)));
        }
    }

    #[test]
    fn test_driver_rejected_block_request_does_not_stall() {
        let config = Config {
            process_count: 1,
            device_count: 1,
            completion_probabilities: vec![1.0],
            max_program_counter: 5,
            ..fast_config()
        };
        let driver = Driver::new(config).unwrap();

        let reports = driver.start(|_| Box::new(BadRequest { requested: false }));

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].state, ProcessState::Terminated);
        assert_eq!(reports[0].program_counter, 5);
    }

    #[test]
    fn test_driver_stop_handle_reports_snapshot() {
        let config = Config {
            time_slice_ms: 10_000,
            max_program_counter: u64::MAX,
            ..fast_config()
        };
        let driver = Driver::new(config).unwrap();
        let stop = driver.stop_handle();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            stop.stop();
        });
        let reports = driver.start(|_| Box::new(Burst));
        stopper.join().unwrap();

        assert_eq!(reports[0].state, ProcessState::Running);
        assert!(reports[0].program_counter > 0);
        assert_eq!(reports[1].state, ProcessState::Ready);
        assert_eq!(reports[1].program_counter, 0);
        assert_eq!(reports[2].program_counter, 0);
    }
}
