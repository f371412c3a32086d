mod cpu;
mod device_queue;
mod error;
mod event;
mod interrupt;
mod process_control_block;
mod process_table;
mod short_term_scheduler;

use cpu::Cpu;
use device_queue::DeviceQueues;
use interrupt::InterruptSource;
use process_control_block::ProcessControlBlock;
use process_table::ProcessTable;
use short_term_scheduler::ShortTermScheduler;

pub mod driver;

pub use device_queue::DeviceId;
pub use driver::Driver;
pub use error::{KernelError, KernelResult};
pub use event::{Directive, Event};
pub use process_control_block::{ProcessId, ProcessState};
