//! Turns unread mail into a local to-do list.
//!
//! Unread messages are fetched through a [`mail::gateway::MailGateway`],
//! stored as [`domain::todo::TodoItem`]s in a JSON file and exported
//! as Markdown.

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod mail;
pub mod store;
pub mod sync;

#[doc(inline)]
pub use crate::error::{Error, Result};
