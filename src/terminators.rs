//! Terminators for controlling and interrupting long-running `maximize` calls.
//!
//! - [`TimeOutTerminator`]: wall-clock timeout.
//! - [`NoImprovementTerminator`]: stops after the incumbent objective has
//!   gone `max_stalled_iterations` calls without improving by more than
//!   `tolerance`.
//! - [`InterruptTerminator`]: responds to Ctrl-C (SIGINT) or a programmatic
//!   interrupt.
//! - [`MultipleTerminators`]: combines any number of terminators.
//!
//! # Note
//! [`InterruptTerminator`] installs a global signal handler and **can only
//! be constructed once** per process. Attempting to create multiple
//! instances will result in a panic.

use std::sync::{Arc, atomic::AtomicBool};

use crate::solver::Status;

pub trait Terminator {
    fn initialize(&mut self) {}

    /// Called once per solver iteration with the current best objective
    /// value, if any, so time- and improvement-based terminators can update
    /// their bookkeeping.
    fn observe(&mut self, _objective: Option<f64>) {}

    fn terminate(&mut self) -> Option<Status>;
}

/// Terminator that responds to Ctrl-C (SIGINT) or programmatic interrupts.
///
/// # Note
/// Only one instance of `InterruptTerminator` can be constructed per
/// process, as it installs a global signal handler. Creating more than one
/// will panic.
pub struct InterruptTerminator {
    interrupted: Arc<AtomicBool>,
}

impl InterruptTerminator {
    pub fn new() -> Self {
        let interrupted = Arc::new(AtomicBool::new(false));
        ctrlc::set_handler({
            let interrupted_clone = interrupted.clone();
            move || {
                interrupted_clone.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        })
        .expect("Error setting Ctrl-C handler");
        Self { interrupted }
    }

    pub fn interrupt(&mut self) {
        self.interrupted.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Terminator for InterruptTerminator {
    fn terminate(&mut self) -> Option<Status> {
        if self.interrupted.load(std::sync::atomic::Ordering::SeqCst) {
            Some(Status::Interrupted)
        } else {
            None
        }
    }
}

/// Terminator that triggers after a specified number of seconds.
pub struct TimeOutTerminator {
    max_time_secs: u64,
    start_time: std::time::Instant,
}

impl TimeOutTerminator {
    pub fn new(max_time_secs: u64) -> Self {
        Self {
            max_time_secs,
            start_time: std::time::Instant::now(),
        }
    }
}

impl Terminator for TimeOutTerminator {
    fn initialize(&mut self) {
        self.start_time = std::time::Instant::now();
    }

    fn terminate(&mut self) -> Option<Status> {
        if self.start_time.elapsed().as_secs() >= self.max_time_secs {
            Some(Status::TimeLimit)
        } else {
            None
        }
    }
}

/// Terminator that triggers once `max_stalled_iterations` consecutive
/// `observe` calls fail to improve the best-seen objective by more than
/// `tolerance`. This is the "no-improvement timeout" `spec.md` §4.2/§5
/// requires alongside the wall-clock one.
pub struct NoImprovementTerminator {
    max_stalled_iterations: usize,
    tolerance: f64,
    best: Option<f64>,
    stalled: usize,
}

impl NoImprovementTerminator {
    pub fn new(max_stalled_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_stalled_iterations,
            tolerance,
            best: None,
            stalled: 0,
        }
    }
}

impl Terminator for NoImprovementTerminator {
    fn initialize(&mut self) {
        self.best = None;
        self.stalled = 0;
    }

    fn observe(&mut self, objective: Option<f64>) {
        let Some(objective) = objective else { return };
        match self.best {
            Some(best) if objective <= best + self.tolerance => self.stalled += 1,
            _ => {
                self.best = Some(objective);
                self.stalled = 0;
            }
        }
    }

    fn terminate(&mut self) -> Option<Status> {
        if self.stalled >= self.max_stalled_iterations {
            Some(Status::TimeLimit)
        } else {
            None
        }
    }
}

/// Terminator that combines multiple terminators and triggers if any of
/// them do.
pub struct MultipleTerminators {
    terminators: Vec<Box<dyn Terminator>>,
}

impl MultipleTerminators {
    pub fn new(terminators: Vec<Box<dyn Terminator>>) -> Self {
        Self { terminators }
    }
}

impl Terminator for MultipleTerminators {
    fn initialize(&mut self) {
        for terminator in &mut self.terminators {
            terminator.initialize();
        }
    }

    fn observe(&mut self, objective: Option<f64>) {
        for terminator in &mut self.terminators {
            terminator.observe(objective);
        }
    }

    fn terminate(&mut self) -> Option<Status> {
        for terminator in &mut self.terminators {
            if let Some(status) = terminator.as_mut().terminate() {
                return Some(status);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_improvement_terminator_stalls_after_threshold() {
        let mut terminator = NoImprovementTerminator::new(2, 1e-9);
        terminator.observe(Some(1.0));
        assert_eq!(terminator.terminate(), None);
        terminator.observe(Some(1.0));
        assert_eq!(terminator.terminate(), None);
        terminator.observe(Some(1.0));
        assert_eq!(terminator.terminate(), Some(Status::TimeLimit));
    }

    #[test]
    fn no_improvement_terminator_resets_on_improvement() {
        let mut terminator = NoImprovementTerminator::new(1, 1e-9);
        terminator.observe(Some(1.0));
        terminator.observe(Some(2.0));
        assert_eq!(terminator.terminate(), None);
    }

    #[cfg(unix)]
    mod platform {
        pub fn send_sigint() {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let pid = std::process::id() as i32;
            signal::kill(Pid::from_raw(pid), Signal::SIGINT).expect("Failed to send SIGINT");
        }
    }

    #[cfg(windows)]
    mod platform {
        pub fn send_sigint() {
            use windows_sys::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_C_EVENT};

            unsafe {
                GenerateConsoleCtrlEvent(CTRL_C_EVENT, 0);
            }
        }
    }

    #[test]
    #[ignore = "sends a real SIGINT to the test process; run explicitly"]
    fn test_interruption_terminator_ctrlc() {
        let mut terminator = InterruptTerminator::new();

        std::thread::spawn(|| {
            std::thread::sleep(std::time::Duration::from_secs(2));
            platform::send_sigint();
        });

        loop {
            if let Some(status) = terminator.terminate() {
                assert_eq!(status, Status::Interrupted);
                break;
            }
        }
    }
}
