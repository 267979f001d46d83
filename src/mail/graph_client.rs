use std::time::Duration;

use log::{debug, info};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::auth::token_manager::TokenManager;
use crate::mail::gateway::{MailGateway, RemoteMessage};
use crate::{Error, Result};

pub const GRAPH_API_ROOT: &str = "https://graph.microsoft.com/v1.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const SELECT_FIELDS: &str = "id,subject,from,receivedDateTime,bodyPreview,webLink";

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    value: Vec<RemoteMessage>,
}

/// Mail gateway talking to the Microsoft Graph REST API.
pub struct GraphClient {
    http: Client,
    tokens: TokenManager,
    mailbox: Vec<String>,
}

impl GraphClient {
    /// `mailbox` is the address of the user whose inbox is read. App
    /// tokens need it; without it the signed-in user (`/me`) is used.
    pub fn new(tokens: TokenManager, mailbox: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(Error::GatewayTransport)?;

        Ok(Self {
            http,
            tokens,
            mailbox: mailbox_segments(mailbox.as_deref()),
        })
    }

    fn endpoint(&self, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(GRAPH_API_ROOT)
            .map_err(|e| Error::InvalidApiUrl(format!("{GRAPH_API_ROOT}: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidApiUrl(GRAPH_API_ROOT.to_string()))?
            .extend(&self.mailbox)
            .extend(tail);
        Ok(url)
    }
}

fn mailbox_segments(mailbox: Option<&str>) -> Vec<String> {
    match mailbox.map(str::trim).filter(|m| !m.is_empty()) {
        Some(user) => vec!["users".to_string(), user.to_string()],
        None => vec!["me".to_string()],
    }
}

/// Turns a non-success response into [`Error::Gateway`].
fn check(resp: Response, accepted: &[StatusCode]) -> Result<Response> {
    let status = resp.status();
    if accepted.contains(&status) {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(Error::Gateway(status.as_u16(), body))
}

impl MailGateway for GraphClient {
    fn fetch_unread(&self, limit: u32) -> Result<Vec<RemoteMessage>> {
        let url = self.endpoint(&["mailFolders", "Inbox", "messages"])?;
        let access = self.tokens.get_access_token()?;

        debug!("fetching up to {limit} unread message(s) from {url}");
        let resp = self
            .http
            .get(url)
            .bearer_auth(access)
            .query(&[
                ("$top", limit.to_string().as_str()),
                ("$filter", "isRead eq false"),
                ("$orderby", "receivedDateTime desc"),
                ("$select", SELECT_FIELDS),
            ])
            .send()
            .map_err(Error::GatewayTransport)?;

        let page: MessagePage = check(resp, &[StatusCode::OK])?
            .json()
            .map_err(Error::GatewayDecode)?;

        info!("mail API returned {} unread message(s)", page.value.len());
        Ok(page.value)
    }

    fn mark_read(&self, message_id: &str) -> Result<()> {
        let url = self.endpoint(&["messages", message_id])?;
        let access = self.tokens.get_access_token()?;

        debug!("marking message {message_id} as read");
        let resp = self
            .http
            .patch(url)
            .bearer_auth(access)
            .json(&json!({ "isRead": true }))
            .send()
            .map_err(Error::GatewayTransport)?;

        check(resp, &[StatusCode::OK, StatusCode::NO_CONTENT])?;
        Ok(())
    }
}
