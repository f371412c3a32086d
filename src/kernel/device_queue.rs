use std::collections::VecDeque;
use std::fmt;

use super::{KernelError, KernelResult, ProcessId};

/// 0-indexed device identifier. Displayed 1-based (`D1`, `D2`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub usize);

impl DeviceId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "D{}", self.0 + 1)
    }
}

/// FIFO queues of blocked processes, one per device.
pub(crate) struct DeviceQueues {
    queues: Vec<VecDeque<ProcessId>>,
}

impl DeviceQueues {
    pub fn new(device_count: usize) -> DeviceQueues {
        DeviceQueues {
            queues: (0..device_count).map(|_| VecDeque::new()).collect(),
        }
    }

    /// Appends `pid` to the tail of `device`'s queue.
    ///
    /// A process may wait on at most one device at a time, so an id that is
    /// present in any queue is rejected.
    pub fn enqueue(&mut self, device: DeviceId, pid: ProcessId) -> KernelResult<()> {
        if let Some(queued_on) = self.device_of(pid) {
            return Err(KernelError::AlreadyQueued {
                pid,
                device: queued_on,
            });
        }

        self.queue_mut(device)?.push_back(pid);
        Ok(())
    }

    /// Removes the head of `device`'s queue. `Ok(None)` when nobody waits.
    pub fn dequeue_front(&mut self, device: DeviceId) -> KernelResult<Option<ProcessId>> {
        Ok(self.queue_mut(device)?.pop_front())
    }

    /// The process that the next completion on `device` would release.
    pub fn front(&self, device: DeviceId) -> KernelResult<Option<ProcessId>> {
        let queue = self
            .queues
            .get(device.index())
            .ok_or(KernelError::UnknownDevice(device))?;
        Ok(queue.front().copied())
    }

    pub fn device_of(&self, pid: ProcessId) -> Option<DeviceId> {
        self.queues
            .iter()
            .position(|queue| queue.contains(&pid))
            .map(DeviceId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, ProcessId)> + '_ {
        self.queues
            .iter()
            .enumerate()
            .flat_map(|(index, queue)| queue.iter().map(move |&pid| (DeviceId(index), pid)))
    }

    fn queue_mut(&mut self, device: DeviceId) -> KernelResult<&mut VecDeque<ProcessId>> {
        self.queues
            .get_mut(device.index())
            .ok_or(KernelError::UnknownDevice(device))
    }
}
