use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, info};

use crate::domain::todo::{Timestamp, TodoItem};
use crate::{Error, Result};

const TABLE_HEADER: &str = "| Subject | Sender | Scheduled | Status |";
const TABLE_SEPARATOR: &str = "| --- | --- | --- | --- |";
const EMPTY_ROW: &str = "| _No tasks available_ |  |  |  |";
const NO_SUBJECT: &str = "(no subject)";

/// Human-friendly local time.
pub fn format_datetime(value: &Timestamp) -> String {
    value.with_timezone(&Local).format("%Y-%m-%d %H:%M %Z").to_string()
}

fn glyph(item: &TodoItem) -> &'static str {
    if item.is_completed() { "✅" } else { "⬜" }
}

fn escape_cell(value: &str) -> String {
    value.replace('|', r"\|")
}

/// Renders tasks as a single Markdown table.
pub fn render_all(items: &[TodoItem]) -> String {
    let mut rows = vec![TABLE_HEADER.to_string(), TABLE_SEPARATOR.to_string()];

    for item in items {
        rows.push(format!(
            "| {} | {} | {} | {} |",
            escape_cell(item.subject()),
            escape_cell(item.sender()),
            format_datetime(&item.scheduled_for()),
            glyph(item),
        ));
    }

    if items.is_empty() {
        rows.push(EMPTY_ROW.to_string());
    }

    rows.join("\n")
}

/// Renders one task as a standalone Markdown document, ending with a
/// single newline.
pub fn render_one(item: &TodoItem) -> String {
    let title = if item.subject().is_empty() {
        NO_SUBJECT
    } else {
        item.subject()
    };

    let mut lines = vec![
        format!("# {title}"),
        String::new(),
        format!("- **Sender:** {}", item.sender()),
        format!("- **Received:** {}", format_datetime(&item.received_at())),
        format!("- **Scheduled:** {}", format_datetime(&item.scheduled_for())),
        format!("- **Status:** {} {}", glyph(item), item.status_label()),
    ];

    if let Some(link) = item.web_link().filter(|l| !l.is_empty()) {
        lines.push(format!("- **Link:** {link}"));
    }

    if !item.body_preview().is_empty() {
        lines.push(String::new());
        lines.push("## Preview".to_string());
        lines.push(String::new());
        lines.push(item.body_preview().to_string());
    }

    let mut out = lines.join("\n").trim().to_string();
    out.push('\n');
    out
}

/// Filesystem-safe form of `value`: anything outside
/// `[A-Za-z0-9._-]` becomes `_`, blank input becomes `task`.
pub fn slug(value: &str) -> String {
    let value = value.trim();
    let value = if value.is_empty() { "task" } else { value };
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn filename_for(item: &TodoItem) -> String {
    format!("{}-{}.md", slug(item.subject()), slug(item.message_id()))
}

/// Writes `content` to `path`, creating parent directories.
pub fn write_markdown(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::CreateExportDir(parent.to_owned(), e))?;
    }
    fs::write(path, content).map_err(|e| Error::WriteMarkdown(path.to_owned(), e))
}

/// Writes one Markdown file per active task into `dir` and removes
/// every other `*.md` file there, so the directory mirrors the active
/// set. Hidden files are left alone. Returns the written paths, sorted.
pub fn export_active(items: &[TodoItem], dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| Error::CreateExportDir(dir.to_owned(), e))?;

    let mut written = Vec::new();
    let mut keep: HashSet<OsString> = HashSet::new();

    for item in items.iter().filter(|i| !i.is_completed()) {
        let name = filename_for(item);
        let path = dir.join(&name);
        fs::write(&path, render_one(item)).map_err(|e| Error::WriteMarkdown(path.clone(), e))?;
        debug!("wrote {}", path.display());
        keep.insert(OsString::from(name));
        written.push(path);
    }

    let entries = fs::read_dir(dir).map_err(|e| Error::ReadExportDir(dir.to_owned(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| Error::ReadExportDir(dir.to_owned(), e))?;
        let path = entry.path();
        let name = entry.file_name();
        let is_md = path.extension().is_some_and(|ext| ext == "md");
        let hidden = name.to_string_lossy().starts_with('.');
        if !is_md || hidden || !path.is_file() || keep.contains(&name) {
            continue;
        }
        fs::remove_file(&path).map_err(|e| Error::RemoveStaleMarkdown(path.clone(), e))?;
        debug!("removed stale {}", path.display());
    }

    written.sort();
    info!("exported {} active task(s) to {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use tempfile::tempdir;

    use super::*;

    fn make_item(subject: &str, completed: bool) -> TodoItem {
        let now = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2023, 1, 1, 12, 0, 0)
            .unwrap();
        let mut item = TodoItem::new(
            format!("id-{subject}"),
            subject,
            "sender@example.com",
            now,
            now,
        );
        if completed {
            item.complete();
        }
        item
    }

    #[test]
    fn table_lists_every_task() {
        let markdown = render_all(&[make_item("Task A", false), make_item("Task B", true)]);
        let lines: Vec<_> = markdown.lines().collect();

        assert_eq!(lines[0], TABLE_HEADER);
        assert_eq!(lines[1], TABLE_SEPARATOR);
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("| Task A | sender@example.com |"));
        assert!(lines[2].ends_with("| ⬜ |"));
        assert!(lines[3].ends_with("| ✅ |"));
    }

    #[test]
    fn table_escapes_pipes() {
        let markdown = render_all(&[make_item("a|b", false)]);
        assert!(markdown.contains(r"| a\|b |"));
    }

    #[test]
    fn empty_table_has_placeholder_row() {
        let markdown = render_all(&[]);
        assert!(markdown.contains("No tasks available"));
        assert_eq!(markdown.lines().count(), 3);
    }

    #[test]
    fn document_includes_details() {
        let item = make_item("Important", true)
            .with_body_preview("Details go here")
            .with_web_link(Some("https://example.com".into()));
        let markdown = render_one(&item);

        assert!(markdown.starts_with("# Important\n\n- **Sender:** sender@example.com\n"));
        assert!(markdown.contains("- **Status:** ✅ Done"));
        assert!(markdown.contains("- **Link:** https://example.com"));
        assert!(markdown.ends_with("## Preview\n\nDetails go here\n"));
    }

    #[test]
    fn document_without_optional_parts() {
        let markdown = render_one(&make_item("", false));

        assert!(markdown.starts_with("# (no subject)\n"));
        assert!(markdown.contains("⬜ Pending"));
        assert!(!markdown.contains("Link"));
        assert!(!markdown.contains("Preview"));
        assert!(markdown.ends_with("Pending\n"));
        assert!(!markdown.ends_with("\n\n"));
    }

    #[test]
    fn slug_replaces_unsafe_chars() {
        assert_eq!(slug("Re: lunch? (today)"), "Re__lunch___today_");
        assert_eq!(slug("  report-v1.2_final  "), "report-v1.2_final");
        assert_eq!(slug("   "), "task");
        assert_eq!(slug("AAMk/ab+c="), "AAMk_ab_c_");
        assert_eq!(slug("é"), "_");
    }

    #[test]
    fn filename_joins_subject_and_id() {
        assert_eq!(filename_for(&make_item("Task A", false)), "Task_A-id-Task_A.md");
    }

    #[test]
    fn export_mirrors_active_tasks() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("active");
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("stale.md"), "old").unwrap();
        fs::write(out.join("notes.txt"), "keep me").unwrap();
        fs::write(out.join(".notes.md"), "hidden").unwrap();

        let items = [make_item("B", false), make_item("A", false), make_item("C", true)];
        let written = export_active(&items, &out).unwrap();

        assert_eq!(written, vec![out.join("A-id-A.md"), out.join("B-id-B.md")]);
        assert!(!out.join("stale.md").exists());
        assert!(!out.join("C-id-C.md").exists());
        assert!(out.join("notes.txt").exists());
        assert!(out.join(".notes.md").exists());
        assert!(
            fs::read_to_string(&written[0])
                .unwrap()
                .starts_with("# A\n")
        );
    }

    #[test]
    fn export_without_active_tasks_clears_directory() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("active");

        export_active(&[make_item("A", false)], &out).unwrap();
        let written = export_active(&[make_item("A", true)], &out).unwrap();

        assert!(written.is_empty());
        let left: Vec<_> = fs::read_dir(&out).unwrap().collect();
        assert!(left.is_empty());
    }

    #[test]
    fn write_markdown_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("todo.md");

        write_markdown(&path, "content").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "content");
    }
}
