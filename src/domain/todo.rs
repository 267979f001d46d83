use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Timezone-aware timestamp used by every task field.
pub type Timestamp = DateTime<FixedOffset>;

/// Completion state of a task. The only allowed transition is
/// `Pending -> Done`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TodoStatus {
    #[default]
    Pending,
    Done,
}

/// A to-do entry derived from (or manually attached to) a mail
/// message.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoItem {
    message_id: String,
    subject: String,
    sender: String,
    received_at: Timestamp,
    scheduled_for: Timestamp,
    body_preview: String,
    web_link: Option<String>,
    status: TodoStatus,
    created_at: Timestamp,
}

/// Persisted shape of a [`TodoItem`], one element of the store
/// document.
///
/// Every field is optional on the way in so that missing values can
/// be reported as [`Error::MalformedRecord`] instead of a generic
/// decoding failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoDocument {
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub sender: Option<String>,
    pub received_at: Option<String>,
    pub scheduled_for: Option<String>,
    pub body_preview: Option<String>,
    pub web_link: Option<String>,
    pub completed: Option<bool>,
    pub created_at: Option<String>,
}

impl TodoItem {
    pub fn new(
        message_id: impl Into<String>,
        subject: impl Into<String>,
        sender: impl Into<String>,
        received_at: Timestamp,
        scheduled_for: Timestamp,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            subject: subject.into(),
            sender: sender.into(),
            received_at,
            scheduled_for,
            body_preview: String::new(),
            web_link: None,
            status: TodoStatus::Pending,
            created_at: Utc::now().into(),
        }
    }

    pub fn with_body_preview(mut self, body_preview: impl Into<String>) -> Self {
        self.body_preview = body_preview.into();
        self
    }

    pub fn with_web_link(mut self, web_link: Option<String>) -> Self {
        self.web_link = web_link;
        self
    }

    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn received_at(&self) -> Timestamp {
        self.received_at
    }

    pub fn scheduled_for(&self) -> Timestamp {
        self.scheduled_for
    }

    pub fn body_preview(&self) -> &str {
        &self.body_preview
    }

    pub fn web_link(&self) -> Option<&str> {
        self.web_link.as_deref()
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn status(&self) -> TodoStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == TodoStatus::Done
    }

    pub fn status_label(&self) -> &'static str {
        match self.status {
            TodoStatus::Pending => "Pending",
            TodoStatus::Done => "Done",
        }
    }

    /// Moves the task to [`TodoStatus::Done`].
    ///
    /// Returns `false` when the task was already done, in which case
    /// nothing changes.
    pub fn complete(&mut self) -> bool {
        if self.is_completed() {
            return false;
        }
        self.status = TodoStatus::Done;
        true
    }

    /// Builds the persisted representation of the task.
    pub fn to_document(&self) -> TodoDocument {
        TodoDocument {
            message_id: Some(self.message_id.clone()),
            subject: Some(self.subject.clone()),
            sender: Some(self.sender.clone()),
            received_at: Some(format_timestamp(&self.received_at)),
            scheduled_for: Some(format_timestamp(&self.scheduled_for)),
            body_preview: Some(self.body_preview.clone()),
            web_link: self.web_link.clone(),
            completed: Some(self.is_completed()),
            created_at: Some(format_timestamp(&self.created_at)),
        }
    }

    /// Rebuilds a task from its persisted representation.
    ///
    /// Documents written before `created_at` existed get the current
    /// time; a `created_at` without offset is read as UTC.
    pub fn from_document(doc: TodoDocument) -> Result<Self> {
        let message_id = required("message_id", doc.message_id)?;
        let subject = required("subject", doc.subject)?;
        let sender = required("sender", doc.sender)?;
        let received_at = parse_timestamp("received_at", &required("received_at", doc.received_at)?)?;
        let scheduled_for =
            parse_timestamp("scheduled_for", &required("scheduled_for", doc.scheduled_for)?)?;
        let created_at = match doc.created_at {
            Some(raw) => parse_timestamp_or_utc("created_at", &raw)?,
            None => Utc::now().into(),
        };
        let status = if doc.completed.unwrap_or(false) {
            TodoStatus::Done
        } else {
            TodoStatus::Pending
        };

        Ok(Self {
            message_id,
            subject,
            sender,
            received_at,
            scheduled_for,
            body_preview: doc.body_preview.unwrap_or_default(),
            web_link: doc.web_link,
            status,
            created_at,
        })
    }

    /// Decodes one element of the store document.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let doc: TodoDocument =
            serde_json::from_value(value).map_err(|err| Error::MalformedRecord(err.to_string()))?;
        Self::from_document(doc)
    }
}

fn required(field: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| Error::MalformedRecord(format!("missing field `{field}`")))
}

/// Formats a timestamp as RFC 3339, keeping its offset.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

/// Parses an ISO-8601 timestamp that must carry an offset (`Z` or
/// `±HH:MM`). Seconds may be omitted.
pub fn parse_timestamp(field: &'static str, value: &str) -> Result<Timestamp> {
    let value = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts);
    }
    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M%#z") {
        return Ok(ts);
    }

    if parse_naive(value).is_some() {
        return Err(Error::NaiveTimestamp(field, value.to_owned()));
    }

    Err(Error::MalformedRecord(format!(
        "invalid timestamp {value:?} for field `{field}`"
    )))
}

/// Like [`parse_timestamp`], but a value without offset is read as UTC.
pub fn parse_timestamp_or_utc(field: &'static str, value: &str) -> Result<Timestamp> {
    match parse_timestamp(field, value) {
        Err(Error::NaiveTimestamp(..)) => match parse_naive(value) {
            Some(naive) => Ok(naive.and_utc().fixed_offset()),
            None => Err(Error::NaiveTimestamp(field, value.trim().to_owned())),
        },
        other => other,
    }
}

/// Date-time without offset: `T` or space separated, seconds optional,
/// or a bare date at midnight.
pub fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    value
        .parse::<NaiveDateTime>()
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").ok())
        .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").ok())
        .or_else(|| {
            value
                .parse::<NaiveDate>()
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
