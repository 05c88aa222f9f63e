//! Per-task FIFO of pending messages.

use alloc::collections::VecDeque;

use crate::message::Message;

/// Ordered queue of messages owned by one task.
#[derive(Debug, Default)]
pub struct Mailbox {
    messages: VecDeque<Message>,
}

impl Mailbox {
    pub fn new() -> Self {
        Mailbox {
            messages: VecDeque::new(),
        }
    }

    /// Append a message behind everything already queued.
    pub fn push(&mut self, msg: Message) {
        self.messages.push_back(msg);
    }

    /// Take the oldest message, if any. Never blocks.
    pub fn pop(&mut self) -> Option<Message> {
        self.messages.pop_front()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
