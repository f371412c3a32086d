use std::fmt::Write;

use crate::kernel::{ProcessId, ProcessState};

/// Read-only view of one process, taken from the process table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessReport {
    pub id: ProcessId,
    pub program_counter: u64,
    pub state: ProcessState,
}

pub fn render_report(reports: &[ProcessReport]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "... ID | PC    | State      | Device");
    let _ = writeln!(out, "...----|-------|------------|-------");
    for report in reports {
        let state = match report.state {
            ProcessState::Ready => "Ready",
            ProcessState::Running => "Running",
            ProcessState::Blocked(_) => "Blocked",
            ProcessState::Terminated => "Terminated",
        };
        let device = report
            .state
            .blocked_on()
            .map_or_else(|| "-".to_string(), |device| device.to_string());

        let _ = writeln!(
            out,
            "... {:02} | {:05} | {:<10} | {}",
            report.id.index(),
            report.program_counter,
            state,
            device
        );
    }

    out
}

pub fn print_report(reports: &[ProcessReport]) {
    println!("Process states:");
    print!("{}", render_report(reports));
}
