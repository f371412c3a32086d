use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{after, select, unbounded, Receiver, Sender};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::Rng;

use super::{DeviceId, Event};

/// Simulated interrupt controller: a timer that fires once per time slice
/// and a device poller that rolls one completion per device per interval.
///
/// Both run on their own threads and only ever talk to the kernel through
/// the event channel.
pub(crate) struct InterruptSource {
    rearm_tx: Option<Sender<()>>,
    shutdown_tx: Option<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl InterruptSource {
    pub fn start(
        time_slice: Duration,
        poll_interval: Duration,
        completion_probabilities: Vec<f64>,
        rng: StdRng,
        events: Sender<Event>,
    ) -> InterruptSource {
        let (rearm_tx, rearm_rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = unbounded();

        let timer_events = events.clone();
        let handles = [
            thread::Builder::new()
                .name("timer".to_string())
                .spawn(move || InterruptSource::run_timer(time_slice, rearm_rx, timer_events)),
            thread::Builder::new().name("devices".to_string()).spawn(move || {
                InterruptSource::run_device_poller(
                    poll_interval,
                    completion_probabilities,
                    rng,
                    shutdown_rx,
                    events,
                )
            }),
        ]
        .into_iter()
        .filter_map(|spawned| {
            spawned
                .map_err(|err| warn!("Failed to spawn interrupt source: {}", err))
                .ok()
        })
        .collect();

        InterruptSource {
            rearm_tx: Some(rearm_tx),
            shutdown_tx: Some(shutdown_tx),
            handles,
        }
    }

    /// Restarts the current time slice from now.
    pub fn rearm_timer(&self) {
        if let Some(rearm_tx) = &self.rearm_tx {
            let _ = rearm_tx.send(());
        }
    }

    /// Stops both threads and waits for them. No event is sent afterwards.
    pub fn stop(mut self) {
        self.rearm_tx.take();
        self.shutdown_tx.take();

        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("An interrupt source thread panicked.");
            }
        }
    }

    fn run_timer(time_slice: Duration, rearm: Receiver<()>, events: Sender<Event>) {
        loop {
            select! {
                recv(rearm) -> command => {
                    if command.is_err() {
                        break;
                    }
                }
                recv(after(time_slice)) -> _ => {
                    if events.send(Event::TimerTick).is_err() {
                        break;
                    }
                }
            }
        }
    }

    fn run_device_poller(
        poll_interval: Duration,
        completion_probabilities: Vec<f64>,
        mut rng: StdRng,
        shutdown: Receiver<()>,
        events: Sender<Event>,
    ) {
        loop {
            select! {
                recv(shutdown) -> _ => break,
                default(poll_interval) => {
                    for (index, &probability) in completion_probabilities.iter().enumerate() {
                        if !rng.gen_bool(probability) {
                            continue;
                        }

                        let device = DeviceId(index);
                        info!("Generating interrupt for device {}.", device);
                        if events.send(Event::DeviceComplete(device)).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use rand::SeedableRng;

    use super::*;

    const SLICE: Duration = Duration::from_millis(30);
    const NEVER: Duration = Duration::from_secs(3600);

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn test_interrupt_source_timer_ticks() {
        let (tx, rx) = unbounded();
        let source = InterruptSource::start(SLICE, NEVER, Vec::new(), rng(), tx);

        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(Event::TimerTick));
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)), Ok(Event::TimerTick));

        source.stop();
    }

    #[test]
    fn test_interrupt_source_rearm_delays_tick() {
        let slice = Duration::from_millis(300);
        let (tx, rx) = unbounded();
        let source = InterruptSource::start(slice, NEVER, Vec::new(), rng(), tx);
        let started = Instant::now();

        thread::sleep(slice / 3);
        source.rearm_timer();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(Event::TimerTick));
        assert!(started.elapsed() >= slice + slice / 3);

        source.stop();
    }

    #[test]
    fn test_interrupt_source_certain_completion_per_device() {
        let (tx, rx) = unbounded();
        let source = InterruptSource::start(
            NEVER,
            Duration::from_millis(5),
            vec![1.0, 0.0, 1.0],
            rng(),
            tx,
        );

        let first: Vec<Event> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();

        source.stop();

        assert_eq!(
            first,
            vec![
                Event::DeviceComplete(DeviceId(0)),
                Event::DeviceComplete(DeviceId(2)),
                Event::DeviceComplete(DeviceId(0)),
                Event::DeviceComplete(DeviceId(2)),
            ]
        );
    }

    #[test]
    fn test_interrupt_source_stop_ends_events() {
        let (tx, rx) = unbounded();
        let source = InterruptSource::start(SLICE, Duration::from_millis(5), vec![1.0], rng(), tx);

        source.stop();

        // Both threads dropped their senders on exit.
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_secs(1)).is_err());
        assert!(rx.is_empty());
    }
}
