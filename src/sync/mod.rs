//! # Sync
//!
//! Reconciles unread mail with the local task list. The
//! [`Synchronizer`] only knows the [`MailGateway`] and
//! [`TodoRepository`] traits, so the real mail API and the task file
//! can be swapped for in-memory stand-ins.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::domain::todo::{Timestamp, TodoItem};
use crate::export::markdown;
use crate::mail::gateway::MailGateway;
use crate::store::repo::TodoRepository;
use crate::{Error, Result};

pub struct Synchronizer<G, S> {
    gateway: G,
    store: S,
}

impl<G: MailGateway, S: TodoRepository> Synchronizer<G, S> {
    pub fn new(gateway: G, store: S) -> Self {
        Self { gateway, store }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (G, S) {
        (self.gateway, self.store)
    }

    /// Imports unread messages as tasks.
    ///
    /// Messages whose id is already stored are skipped. New tasks are
    /// scheduled at `schedule` when given, else at their received
    /// time. A message that cannot be converted fails the whole sync
    /// with the store left untouched. The store is saved once, and only
    /// if something was added.
    pub fn sync(&mut self, limit: u32, schedule: Option<Timestamp>) -> Result<Vec<TodoItem>> {
        let messages = self.gateway.fetch_unread(limit)?;
        debug!("fetched {} unread message(s)", messages.len());

        // convert everything before touching the store
        let mut seen = HashSet::new();
        let mut created = Vec::new();
        for message in &messages {
            if self.store.contains(&message.id) || !seen.insert(message.id.as_str()) {
                debug!("message {} already imported, skipping", message.id);
                continue;
            }
            created.push(message.to_todo(schedule)?);
        }

        for item in &created {
            self.store.add(item.clone(), true)?;
        }

        if !created.is_empty() {
            self.store.save()?;
            info!("imported {} new task(s)", created.len());
        }

        Ok(created)
    }

    /// Completes a task and flags its message as read.
    ///
    /// The message is flagged first: if the mail API fails, the task
    /// stays pending. Completing a done task is a no-op.
    pub fn mark_done(&mut self, message_id: &str) -> Result<TodoItem> {
        let mut item = self
            .store
            .get(message_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(message_id.to_owned()))?;

        if item.is_completed() {
            debug!("task {message_id} already done");
            return Ok(item);
        }

        self.gateway.mark_read(message_id)?;
        item.complete();
        self.store.update(item.clone())?;
        self.store.save()?;

        info!("completed task {message_id}");
        Ok(item)
    }

    pub fn list(&self) -> Vec<TodoItem> {
        self.store.all()
    }

    /// Adds a task that has no backing message. Its id is
    /// `manual-<n>`, with `n` the first free number from the store
    /// size plus one.
    pub fn add_manual(
        &mut self,
        subject: &str,
        sender: &str,
        scheduled_for: Timestamp,
        body_preview: &str,
        web_link: Option<String>,
    ) -> Result<TodoItem> {
        let mut n = self.store.len() + 1;
        while self.store.contains(&format!("manual-{n}")) {
            n += 1;
        }

        let item = TodoItem::new(format!("manual-{n}"), subject, sender, scheduled_for, scheduled_for)
            .with_body_preview(body_preview)
            .with_web_link(web_link);

        self.store.add(item.clone(), true)?;
        self.store.save()?;
        Ok(item)
    }

    /// The Markdown table of every task, without touching the disk.
    pub fn markdown(&self) -> String {
        markdown::render_all(&self.store.all())
    }

    pub fn export_markdown(&self, output: &Path) -> Result<PathBuf> {
        markdown::write_markdown(output, &self.markdown())?;
        info!("wrote markdown overview to {}", output.display());
        Ok(output.to_owned())
    }

    pub fn export_active_markdown(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        markdown::export_active(&self.store.all(), dir)
    }
}
