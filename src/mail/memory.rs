use std::cell::RefCell;
use std::collections::HashSet;

use log::debug;

use crate::Result;
use crate::mail::gateway::{MailGateway, RemoteMessage};

/// Mail gateway holding its messages in memory, for demos and tests.
///
/// Read messages are no longer returned by
/// [`MailGateway::fetch_unread`]. Every [`MailGateway::mark_read`]
/// call is recorded.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    messages: Vec<RemoteMessage>,
    read: RefCell<HashSet<String>>,
    mark_read_calls: RefCell<Vec<String>>,
}

impl InMemoryGateway {
    pub fn new(messages: impl IntoIterator<Item = RemoteMessage>) -> Self {
        Self {
            messages: messages.into_iter().collect(),
            ..Default::default()
        }
    }

    /// Ids passed to [`MailGateway::mark_read`], in call order.
    pub fn mark_read_calls(&self) -> Vec<String> {
        self.mark_read_calls.borrow().clone()
    }

    pub fn is_read(&self, message_id: &str) -> bool {
        self.read.borrow().contains(message_id)
    }
}

impl MailGateway for InMemoryGateway {
    fn fetch_unread(&self, limit: u32) -> Result<Vec<RemoteMessage>> {
        let read = self.read.borrow();
        Ok(self
            .messages
            .iter()
            .filter(|msg| !read.contains(&msg.id))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn mark_read(&self, message_id: &str) -> Result<()> {
        debug!("marking in-memory message {message_id} as read");
        self.mark_read_calls.borrow_mut().push(message_id.to_owned());
        if self.messages.iter().any(|msg| msg.id == message_id) {
            self.read.borrow_mut().insert(message_id.to_owned());
        }
        Ok(())
    }
}
