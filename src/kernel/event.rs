use super::{DeviceId, ProcessId};

/// Everything the kernel reacts to. All sources feed one channel, which the
/// driver drains in arrival order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// The time slice of the running process expired.
    TimerTick,
    /// A device finished an operation; one waiter may resume.
    DeviceComplete(DeviceId),
    /// The running process finished one unit of work.
    Executed(ProcessId),
    /// The running process asks to wait on a device.
    BlockRequest { pid: ProcessId, device: DeviceId },
    /// External stop request.
    Shutdown,
}

/// Instructions emitted by the scheduler after handling an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Directive {
    Resume(ProcessId),
    Pause(ProcessId),
    /// The process terminated; its execution unit should exit.
    Retire(ProcessId),
    /// Start a fresh time slice.
    RearmTimer,
}
