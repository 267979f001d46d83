use anyhow::{Result, anyhow};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use log::warn;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use outlook_todo::Error;
use outlook_todo::auth::{token_manager::TokenManager, token_store, tokens_file};
use outlook_todo::config::{Config, load_config, resolve_storage_path};
use outlook_todo::domain::todo::{Timestamp, format_timestamp, parse_naive, parse_timestamp};
use outlook_todo::mail::gateway::MailGateway;
use outlook_todo::mail::graph_client::GraphClient;
use outlook_todo::mail::memory::InMemoryGateway;
use outlook_todo::store::json::JsonStore;
use outlook_todo::sync::Synchronizer;

type App = Synchronizer<Box<dyn MailGateway>, JsonStore>;

#[derive(Parser)]
#[command(name = "outlook_todo")]
#[command(about = "Outlook unread mail to-do synchroniser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import unread Outlook mails as tasks
    Sync {
        /// Maximum number of emails to fetch (defaults to the configured limit)
        #[arg(long)]
        limit: Option<u32>,

        /// Override the scheduled time for all created tasks (ISO-8601)
        #[arg(long, value_parser = parse_schedule)]
        schedule: Option<Timestamp>,
    },

    /// List all known tasks
    List,

    /// Mark a task as complete
    MarkDone {
        /// Identifier of the underlying Outlook message
        message_id: String,
    },

    /// Add a task that is not backed by an email
    Add {
        subject: String,

        #[arg(long, default_value = "me")]
        sender: String,

        /// When the task is due (ISO-8601)
        #[arg(long, value_parser = parse_schedule)]
        at: Timestamp,

        #[arg(long, default_value = "")]
        preview: String,

        #[arg(long)]
        link: Option<String>,
    },

    /// Write the current tasks to a Markdown file
    ExportMarkdown {
        #[arg(default_value = "todo.md")]
        output: PathBuf,
    },

    /// Create individual Markdown files for each active task
    ExportActiveMarkdown {
        /// Destination directory for the per-task Markdown files
        #[arg(default_value = "active_tasks")]
        directory: PathBuf,
    },

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

/// ISO-8601 timestamp; without offset it is read as local time.
fn parse_schedule(value: &str) -> std::result::Result<Timestamp, String> {
    match parse_timestamp("schedule", value) {
        Ok(ts) => Ok(ts),
        Err(Error::NaiveTimestamp(..)) => {
            let value = value.trim();
            let naive = parse_naive(value).ok_or_else(|| format!("invalid timestamp {value:?}"))?;
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.fixed_offset())
                .ok_or_else(|| format!("{value:?} does not exist in the local timezone"))
        }
        Err(e) => Err(e.to_string()),
    }
}

fn open_app(cfg: &Config, with_mail: bool) -> Result<App> {
    let store = JsonStore::load(resolve_storage_path(cfg)?)?;

    let gateway: Box<dyn MailGateway> = if with_mail {
        let creds = cfg.credentials(token_store::load_client_secret)?;
        let cache = match tokens_file::tokens_path() {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("token cache disabled: {e}");
                None
            }
        };
        Box::new(GraphClient::new(TokenManager::new(creds, cache), cfg.mailbox.clone())?)
    } else {
        // local commands never reach the mail API
        Box::new(InMemoryGateway::default())
    };

    Ok(Synchronizer::new(gateway, store))
}

fn display(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_owned())
        .display()
        .to_string()
}

fn set_client_secret(client_id: &str) -> Result<ExitCode> {
    eprintln!("Paste client secret (end with Ctrl-D):");
    let mut secret = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(anyhow!("empty client secret"));
    }
    token_store::save_client_secret(client_id, secret)?;
    println!("Saved client secret for client_id {}", client_id);
    Ok(ExitCode::SUCCESS)
}

fn run(cmd: Command) -> Result<ExitCode> {
    if let Command::SetClientSecret { client_id } = &cmd {
        return set_client_secret(client_id);
    }

    let cfg = load_config().map_err(|e| anyhow!("Configuration error: {e:#}"))?;
    let with_mail = matches!(cmd, Command::Sync { .. } | Command::MarkDone { .. });
    let mut app = open_app(&cfg, with_mail)?;

    match cmd {
        Command::Sync { limit, schedule } => {
            let new_items = app.sync(limit.unwrap_or(cfg.fetch_limit()), schedule)?;
            if new_items.is_empty() {
                println!("No new unread mails were found.");
                return Ok(ExitCode::SUCCESS);
            }
            println!("Imported {} mail(s) into the to-do list:", new_items.len());
            for item in new_items {
                println!(
                    " - {} (scheduled for {})",
                    item.subject(),
                    format_timestamp(&item.scheduled_for())
                );
            }
        }

        Command::List => {
            let items = app.list();
            if items.is_empty() {
                println!("No tasks available.");
                return Ok(ExitCode::SUCCESS);
            }
            for item in items {
                println!(
                    "[{}] {} — scheduled for {}",
                    item.status_label(),
                    item.subject(),
                    format_timestamp(&item.scheduled_for())
                );
            }
        }

        Command::MarkDone { message_id } => match app.mark_done(&message_id) {
            Ok(item) => println!(
                "Marked '{}' as complete and flagged the original e-mail as read.",
                item.subject()
            ),
            Err(Error::NotFound(_)) => {
                println!("No task with id {message_id} exists.");
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => return Err(e.into()),
        },

        Command::Add {
            subject,
            sender,
            at,
            preview,
            link,
        } => {
            let item = app.add_manual(&subject, &sender, at, &preview, link)?;
            println!(
                "Added '{}' as {} (scheduled for {})",
                item.subject(),
                item.message_id(),
                format_timestamp(&item.scheduled_for())
            );
        }

        Command::ExportMarkdown { output } => {
            let path = app.export_markdown(&output)?;
            println!("Wrote Markdown overview to {}", display(&path));
        }

        Command::ExportActiveMarkdown { directory } => {
            let paths = app.export_active_markdown(&directory)?;
            if paths.is_empty() {
                println!(
                    "No active tasks found. Cleared Markdown directory at {}.",
                    display(&directory)
                );
                return Ok(ExitCode::SUCCESS);
            }
            println!(
                "Wrote {} Markdown file(s) to {}:",
                paths.len(),
                display(&directory)
            );
            for path in paths {
                if let Some(name) = path.file_name() {
                    println!(" - {}", name.to_string_lossy());
                }
            }
        }

        Command::SetClientSecret { client_id } => return set_client_secret(&client_id),
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();

    match run(cli.cmd) {
        Ok(code) => code,
        Err(err) => {
            if let Some(e) = err.downcast_ref::<Error>()
                && e.is_gateway()
            {
                eprintln!("Graph API error: {e}");
                return ExitCode::from(2);
            }
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
