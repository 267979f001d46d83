use serde::{Deserialize, Serialize};

use crate::Result;
use crate::domain::todo::{Timestamp, TodoItem, parse_timestamp_or_utc};

/// Remote mail service capable of listing unread messages and
/// flagging them as read.
pub trait MailGateway {
    /// Unread inbox messages, newest received first, at most `limit`.
    fn fetch_unread(&self, limit: u32) -> Result<Vec<RemoteMessage>>;

    /// Flags a message as read. Marking an already-read message is
    /// not an error.
    fn mark_read(&self, message_id: &str) -> Result<()>;
}

impl<G: MailGateway + ?Sized> MailGateway for Box<G> {
    fn fetch_unread(&self, limit: u32) -> Result<Vec<RemoteMessage>> {
        (**self).fetch_unread(limit)
    }

    fn mark_read(&self, message_id: &str) -> Result<()> {
        (**self).mark_read(message_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddress {
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: Option<EmailAddress>,
}

/// A message as reported by the mail API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    pub id: String,
    pub subject: Option<String>,
    pub from: Option<Recipient>,
    pub received_date_time: String,
    pub body_preview: Option<String>,
    pub web_link: Option<String>,
}

impl RemoteMessage {
    /// Display name of the sender, falling back to the address.
    pub fn sender(&self) -> String {
        self.from
            .as_ref()
            .and_then(|from| from.email_address.as_ref())
            .and_then(|addr| {
                addr.name
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .or(addr.address.as_deref().filter(|s| !s.is_empty()))
            })
            .unwrap_or("Unknown sender")
            .to_owned()
    }

    /// Received time; the API reports UTC, so a value without offset
    /// is read as UTC.
    pub fn received_at(&self) -> Result<Timestamp> {
        parse_timestamp_or_utc("receivedDateTime", &self.received_date_time)
    }

    /// Builds the task for this message, scheduled at `schedule` or,
    /// when absent, at the received time.
    pub fn to_todo(&self, schedule: Option<Timestamp>) -> Result<TodoItem> {
        let received_at = self.received_at()?;
        let subject = self
            .subject
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("(no subject)");

        let item = TodoItem::new(
            self.id.clone(),
            subject,
            self.sender(),
            received_at,
            schedule.unwrap_or(received_at),
        )
        .with_body_preview(self.body_preview.clone().unwrap_or_default())
        .with_web_link(self.web_link.clone());

        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Error;
    use crate::domain::todo::parse_timestamp;

    fn message(value: serde_json::Value) -> RemoteMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn decodes_graph_payload() {
        let msg = message(json!({
            "id": "AAMk1",
            "subject": "Quarterly report",
            "from": { "emailAddress": { "name": "Alice", "address": "alice@example.com" } },
            "receivedDateTime": "2023-01-01T09:00:00Z",
            "bodyPreview": "Please review",
            "webLink": "https://outlook.example/1",
        }));

        let item = msg.to_todo(None).unwrap();
        assert_eq!(item.message_id(), "AAMk1");
        assert_eq!(item.subject(), "Quarterly report");
        assert_eq!(item.sender(), "Alice");
        assert_eq!(item.scheduled_for(), item.received_at());
        assert_eq!(item.body_preview(), "Please review");
        assert_eq!(item.web_link(), Some("https://outlook.example/1"));
        assert_eq!(item.received_at().offset().local_minus_utc(), 0);
    }

    #[test]
    fn sender_falls_back_to_address_then_placeholder() {
        let msg = message(json!({
            "id": "1",
            "from": { "emailAddress": { "address": "bob@example.com" } },
            "receivedDateTime": "2023-01-01T09:00:00Z",
        }));
        assert_eq!(msg.sender(), "bob@example.com");

        let msg = message(json!({ "id": "2", "receivedDateTime": "2023-01-01T09:00:00Z" }));
        assert_eq!(msg.sender(), "Unknown sender");
    }

    #[test]
    fn missing_subject_gets_placeholder() {
        let msg = message(json!({ "id": "1", "receivedDateTime": "2023-01-01T09:00:00Z" }));
        assert_eq!(msg.to_todo(None).unwrap().subject(), "(no subject)");
    }

    #[test]
    fn naive_received_time_is_utc() {
        let msg = message(json!({ "id": "1", "receivedDateTime": "2023-01-01T09:00:00" }));
        let received = msg.received_at().unwrap();
        assert_eq!(received.offset().local_minus_utc(), 0);
        assert_eq!(received.to_rfc3339(), "2023-01-01T09:00:00+00:00");
    }

    #[test]
    fn garbage_received_time_is_malformed() {
        let msg = message(json!({ "id": "1", "receivedDateTime": "garbage" }));
        let err = msg.to_todo(None).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(m) if m.contains("garbage")));
    }

    #[test]
    fn schedule_override_wins() {
        let schedule = parse_timestamp("schedule", "2023-02-01T08:00:00+01:00").unwrap();
        let msg = message(json!({ "id": "1", "receivedDateTime": "2023-01-01T09:00:00Z" }));

        let item = msg.to_todo(Some(schedule)).unwrap();
        assert_eq!(item.scheduled_for(), schedule);
        assert_ne!(item.received_at(), schedule);
    }
}
