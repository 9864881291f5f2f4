//! Rendering of the course table report.
//!
//! Supports an HTML table for the browser and CSV for files and downloads.

use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use csv::WriterBuilder;
use tracing::{debug, info};

use crate::analyzers::TableRow;
use crate::store::Assignment;

/// Serializes `rows` as CSV (with a header row) into `writer`.
pub fn write_rows<W: Write>(writer: W, rows: &[TableRow]) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// CSV text for `rows`.
pub fn rows_to_csv(rows: &[TableRow]) -> Result<String> {
    let mut buf = Vec::new();
    write_rows(&mut buf, rows)?;
    Ok(String::from_utf8(buf)?)
}

/// Writes the report to `path`, replacing any existing file.
pub fn write_table(path: &Path, rows: &[TableRow]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing course table");
    let file = File::create(path)?;
    write_rows(file, rows)?;
    info!(path = %path.display(), rows = rows.len(), "Course table written");
    Ok(())
}

/// Renders the course table as a standalone HTML page.
pub fn render_html(assignment: Assignment, group: Option<i64>, rows: &[TableRow]) -> String {
    let title = match group {
        Some(g) => format!("{assignment} scores, group {g}"),
        None => format!("{assignment} scores"),
    };

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{}</title>", escape_html(&title));
    html.push_str("</head>\n<body>\n<table>\n");
    let _ = writeln!(html, "<caption>{}</caption>", escape_html(&title));
    html.push_str("<tr><th>Name</th><th>Group</th><th>Score</th></tr>\n");
    for row in rows {
        let _ = writeln!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&row.name),
            row.group,
            row.score
        );
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
