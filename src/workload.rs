use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::kernel::{DeviceId, ProcessId};

/// The body of a simulated process.
///
/// `run` performs one unit of work for `pid`. A workload that wants to wait
/// on a device calls `on_block_request` before returning; the execution unit
/// then suspends until the kernel dispatches the process again.
pub trait Workload: Send {
    fn run(&mut self, pid: ProcessId, on_block_request: &mut dyn FnMut(DeviceId));
}

/// Sleeps for one step, then asks for I/O on a random device with a fixed
/// probability.
pub struct RandomWorkload {
    rng: StdRng,
    step: Duration,
    io_request_probability: f64,
    device_count: usize,
}

impl RandomWorkload {
    pub fn new(pid: ProcessId, config: &Config) -> RandomWorkload {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(pid.index() as u64 + 1)),
            None => StdRng::from_entropy(),
        };

        RandomWorkload {
            rng,
            step: config.step(),
            io_request_probability: config.io_request_probability,
            device_count: config.device_count,
        }
    }
}

impl Workload for RandomWorkload {
    fn run(&mut self, _pid: ProcessId, on_block_request: &mut dyn FnMut(DeviceId)) {
        thread::sleep(self.step);

        if self.rng.gen_bool(self.io_request_probability) {
            on_block_request(DeviceId(self.rng.gen_range(0..self.device_count)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(io_request_probability: f64) -> Config {
        Config {
            step_ms: 0,
            io_request_probability,
            seed: Some(7),
            ..Config::default()
        }
    }

    #[test]
    fn test_random_workload_never_blocks_at_zero_probability() {
        let mut workload = RandomWorkload::new(ProcessId(0), &config(0.0));
        let mut requests = Vec::new();

        for _ in 0..100 {
            workload.run(ProcessId(0), &mut |device| requests.push(device));
        }

        assert!(requests.is_empty());
    }

    #[test]
    fn test_random_workload_always_blocks_on_known_device() {
        let config = config(1.0);
        let mut workload = RandomWorkload::new(ProcessId(1), &config);
        let mut requests = Vec::new();

        for _ in 0..100 {
            workload.run(ProcessId(1), &mut |device| requests.push(device));
        }

        assert_eq!(requests.len(), 100);
        assert!(requests.iter().all(|device| device.index() < config.device_count));
    }

    #[test]
    fn test_random_workload_seeded_is_reproducible() {
        let config = config(0.5);
        let mut first = RandomWorkload::new(ProcessId(2), &config);
        let mut second = RandomWorkload::new(ProcessId(2), &config);
        let (mut a, mut b) = (Vec::new(), Vec::new());

        for _ in 0..50 {
            first.run(ProcessId(2), &mut |device| a.push(device));
            second.run(ProcessId(2), &mut |device| b.push(device));
        }

        assert_eq!(a, b);
    }
}
