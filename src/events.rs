//! Events emitted by the controller for rendering, audio and notification
//! consumers.
//!
//! Each subscriber owns a channel receiver. Events arrive in emission
//! order and none are dropped while the receiver is alive.

use crate::domain::TaskId;
use std::sync::mpsc::{channel, Receiver, Sender};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// One timer tick has been processed
    Tick,
    AlarmTriggered { task_id: TaskId, level: u32 },
    /// Alarm set went empty (dismissed, paused, completed, slept)
    AlarmsCleared,
    /// Appended at the end of the active set
    TaskAdded { task_id: TaskId, position: usize },
    /// Placed in the middle of the active set (subtask, undo)
    TaskInserted { task_id: TaskId, position: usize },
    TaskRemoved { task_id: TaskId, position: usize },
    /// State or linkage changed in place
    TaskUpdated { task_id: TaskId },
    TaskCompleted {
        task_id: TaskId,
        name: String,
        within_ambitious: bool,
    },
    FocusChanged(Option<usize>),
}

#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<Event>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<Event> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Deliver to every live subscriber; hung-up receivers are forgotten
    pub fn emit(&mut self, event: Event) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
