//! Deferred work units and the handles that collect their results.

use crate::error::{KpmError, Result};
use std::fmt;
use std::sync::mpsc::{Receiver, TryRecvError};

type Job<T> = Box<dyn FnOnce() -> Result<T> + Send + 'static>;

/// A computation packaged for later execution.
///
/// Arguments are validated when the unit is created, so running it can only fail for reasons
/// that depend on the work itself.
pub struct Deferred<T> {
    label: String,
    job: Job<T>,
}

impl<T> Deferred<T> {
    pub fn new<F>(label: impl Into<String>, job: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        Self {
            label: label.into(),
            job: Box::new(job),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run on the calling thread.
    pub fn compute(self) -> Result<T> {
        (self.job)()
    }

    /// Same unit with `f` applied to its successful result.
    pub fn map<U, F>(self, f: F) -> Deferred<U>
    where
        T: 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let job = self.job;
        Deferred {
            label: self.label,
            job: Box::new(move || job().map(f)),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred").field("label", &self.label).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Complete,
    Failed,
    Cancelled,
}

/// Result channel of one submitted unit.
pub struct TaskHandle<T> {
    id: usize,
    label: String,
    receiver: Receiver<Result<T>>,
    outcome: Option<Result<T>>,
}

impl<T> TaskHandle<T> {
    pub(crate) fn new(id: usize, label: String, receiver: Receiver<Result<T>>) -> Self {
        Self {
            id,
            label,
            receiver,
            outcome: None,
        }
    }

    /// Submission order within the dispatcher.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Check for a result without blocking.
    pub fn poll(&mut self) -> TaskStatus {
        if self.outcome.is_none() {
            match self.receiver.try_recv() {
                Ok(result) => self.outcome = Some(result),
                Err(TryRecvError::Empty) => return TaskStatus::Pending,
                Err(TryRecvError::Disconnected) => self.outcome = Some(Err(KpmError::WorkerPanicked)),
            }
        }
        match &self.outcome {
            Some(Ok(_)) => TaskStatus::Complete,
            Some(Err(KpmError::Cancelled)) => TaskStatus::Cancelled,
            Some(Err(_)) => TaskStatus::Failed,
            None => TaskStatus::Pending,
        }
    }

    /// Block until the unit has finished.
    pub fn wait(self) -> Result<T> {
        match self.outcome {
            Some(result) => result,
            None => self.receiver.recv().unwrap_or(Err(KpmError::WorkerPanicked)),
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("ready", &self.outcome.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn deferred_runs_inline() {
        let unit = Deferred::new("answer", || Ok(42));
        assert_eq!(unit.label(), "answer");
        assert_eq!(unit.compute().unwrap(), 42);
    }

    #[test]
    fn map_keeps_label_and_errors() {
        let unit = Deferred::new("pair", || Ok((3, 4))).map(|(a, b)| a + b);
        assert_eq!(unit.label(), "pair");
        assert_eq!(unit.compute().unwrap(), 7);
        let failing = Deferred::new("bad", || Err::<i32, _>(KpmError::Cancelled)).map(|v| v * 2);
        assert!(matches!(failing.compute(), Err(KpmError::Cancelled)));
    }

    #[test]
    fn handle_reports_status_transitions() {
        let (tx, rx) = mpsc::channel();
        let mut handle = TaskHandle::new(0, "t".to_string(), rx);
        assert_eq!(handle.poll(), TaskStatus::Pending);
        tx.send(Ok(7)).unwrap();
        assert_eq!(handle.poll(), TaskStatus::Complete);
        assert_eq!(handle.wait().unwrap(), 7);

        let (tx, rx) = mpsc::channel::<Result<i32>>();
        let mut handle = TaskHandle::new(1, "t".to_string(), rx);
        tx.send(Err(KpmError::Cancelled)).unwrap();
        assert_eq!(handle.poll(), TaskStatus::Cancelled);
    }

    #[test]
    fn dropped_sender_means_worker_died() {
        let (tx, rx) = mpsc::channel::<Result<i32>>();
        drop(tx);
        let handle = TaskHandle::new(0, "t".to_string(), rx);
        assert!(matches!(handle.wait(), Err(KpmError::WorkerPanicked)));
    }
}
