//! Unbounded FIFO of analysis tasks shared by the request side and the
//! worker loops.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use super::task::AnalysisTask;

pub struct TaskQueue {
    sender: mpsc::UnboundedSender<AnalysisTask>,
    receiver: Mutex<mpsc::UnboundedReceiver<AnalysisTask>>,
    len: AtomicUsize,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            len: AtomicUsize::new(0),
        }
    }

    /// Appends a task. Never blocks and never rejects.
    pub fn enqueue(&self, task: AnalysisTask) {
        self.len.fetch_add(1, Ordering::SeqCst);
        // The receiver lives as long as `self`, so the send cannot fail.
        if self.sender.send(task).is_err() {
            self.len.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Removes the oldest task, or returns `None` once `timeout` elapses.
    pub async fn dequeue(&self, timeout: Duration) -> Option<AnalysisTask> {
        let task = tokio::time::timeout(timeout, async {
            let mut receiver = self.receiver.lock().await;
            receiver.recv().await
        })
        .await
        .ok()
        .flatten()?;

        self.len.fetch_sub(1, Ordering::SeqCst);
        Some(task)
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every queued task and returns how many were dropped.
    pub async fn clear(&self) -> usize {
        let mut receiver = self.receiver.lock().await;
        let mut dropped = 0;
        while receiver.try_recv().is_ok() {
            dropped += 1;
        }
        self.len.fetch_sub(dropped, Ordering::SeqCst);
        dropped
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
