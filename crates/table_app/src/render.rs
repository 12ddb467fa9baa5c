//! Plain-text rendering of a table view for stdout.

use chrono::{DateTime, Utc};
use table_core::{LoadStatus, Row, TableViewModel};

pub fn format_timestamp(millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => millis.to_string(),
    }
}

pub fn render_row(row: &Row, selected: bool) -> String {
    let marker = if selected { '>' } else { ' ' };
    let mut line = format!("{marker} {:<12} {}", row.id, format_timestamp(row.timestamp));
    for (name, value) in &row.fields {
        match value.as_str() {
            Some(text) => line.push_str(&format!("  {name}={text}")),
            None => line.push_str(&format!("  {name}={value}")),
        }
    }
    line
}

pub fn status_line(view: &TableViewModel) -> String {
    let status = match view.status {
        LoadStatus::Idle => "idle",
        LoadStatus::LoadingFirstPage => "loading",
        LoadStatus::Ready => "ready",
        LoadStatus::LoadingNextPage => "loading more",
        LoadStatus::Refreshing => "refreshing",
        LoadStatus::Error => "error",
    };
    let total = match view.total_count {
        Some(total) => format!(" of {total}"),
        None => String::new(),
    };
    let more = if view.has_more { ", more available" } else { ", end of data" };
    format!("[{status}] {} rows{total}{more}", view.rows.len())
}

/// Error and live-mode banners, one per line. Empty when there is nothing to say.
pub fn banners(view: &TableViewModel) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(error) = &view.error {
        let hint = if error.retryable {
            "retry to try again"
        } else {
            "not retryable"
        };
        lines.push(format!(
            "! {:?} page failed: {} ({hint})",
            error.purpose, error.message
        ));
    }
    if view.live.enabled {
        let mut line = String::from("* live");
        if view.live.auto_merge {
            line.push_str(", auto-merge");
        }
        if view.live.staged_count > 0 {
            line.push_str(&format!(", {} new rows staged", view.live.staged_count));
        }
        if let Some(error) = &view.live.error {
            line.push_str(&format!(", last poll failed: {error}"));
        }
        lines.push(line);
    }
    lines
}

pub fn render(view: &TableViewModel) -> String {
    let mut out = Vec::new();
    if !view.query.is_empty() {
        out.push(format!("? {}", view.query));
    }
    out.push(status_line(view));
    out.extend(banners(view));
    out.extend(
        view.rows
            .iter()
            .map(|row| render_row(row, view.selected.as_deref() == Some(row.id.as_str()))),
    );
    out.join("\n")
}
