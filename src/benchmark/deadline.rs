//! Deadline-bounded tasks
//!
//! Runs a blocking closure on its own thread and waits for it up to a
//! deadline. The result is either joined or explicitly abandoned. An abandoned
//! thread keeps running until its closure returns; nothing here can interrupt
//! a blocking call, so any work it started on a server continues too.

use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

/// How a deadline-bounded task ended, from the waiter's point of view
#[derive(Debug, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    /// Finished before the deadline; the thread has been joined
    Joined(T),
    /// Still running at the deadline; the thread was detached
    Abandoned,
    /// The closure panicked
    Panicked,
}

/// Run `task` on a named thread, waiting at most `deadline` for its result
pub fn run_with_deadline<T, F>(name: String, deadline: Duration, task: F) -> io::Result<TaskOutcome<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    let handle = thread::Builder::new().name(name).spawn(move || {
        // The receiver is gone if the waiter already gave up
        tx.send(task()).ok();
    })?;

    match rx.recv_timeout(deadline) {
        Ok(value) => {
            handle.join().ok();
            Ok(TaskOutcome::Joined(value))
        }
        Err(RecvTimeoutError::Timeout) => {
            drop(handle);
            Ok(TaskOutcome::Abandoned)
        }
        Err(RecvTimeoutError::Disconnected) => {
            handle.join().ok();
            Ok(TaskOutcome::Panicked)
        }
    }
}
