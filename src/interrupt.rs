//! Ctrl-C handling.
//!
//! While GDB is running, Ctrl-C only raises a flag: the wait loop in
//! [`crate::debugger`] notices it, kills the debugger's process group and
//! returns. When nothing is running (e.g. at a prompt), the idle callback
//! runs instead, which prints the farewell and exits with status 0.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Farewell printed when the user interrupts the tool
pub const FAREWELL: &str = "Interrupted. Goodbye!";

/// Shared interrupt state between the signal handler and the wait loop
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    requested: Arc<AtomicBool>,
    child_active: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the process-wide Ctrl-C handler.
    ///
    /// `on_idle` runs on the handler thread when no debugger is active.
    pub fn install<F>(&self, on_idle: F) -> Result<(), ctrlc::Error>
    where
        F: Fn() + Send + 'static,
    {
        let interrupt = self.clone();
        ctrlc::set_handler(move || {
            if interrupt.child_active.load(Ordering::SeqCst) {
                log::warn!("interrupt received, stopping debugger");
                interrupt.request();
            } else {
                on_idle();
            }
        })
    }

    /// Ask the running debugger to stop
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Whether a debugger child is currently being waited on
    pub fn is_child_active(&self) -> bool {
        self.child_active.load(Ordering::SeqCst)
    }

    /// Mark a debugger child as active until the guard is dropped
    pub fn enter_child(&self) -> ChildGuard {
        self.child_active.store(true, Ordering::SeqCst);
        ChildGuard {
            interrupt: self.clone(),
        }
    }
}

/// Clears the active-child flag on drop
#[derive(Debug)]
pub struct ChildGuard {
    interrupt: Interrupt,
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.interrupt.child_active.store(false, Ordering::SeqCst);
    }
}
