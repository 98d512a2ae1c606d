//! HTML rendering of change tables, styled for email clients

use super::delta_cell;
use crate::comparison::ComparisonTable;

/// Inline styles; most mail clients drop `<style>` blocks
const TABLE_STYLE: &str = "border-collapse: collapse; margin-bottom: 20px; \
    font-family: -apple-system, 'Segoe UI', Roboto, sans-serif;";
const HEADER_STYLE: &str = "background-color: #4a90d9; color: white; \
    border: 1px solid #ddd; padding: 6px 10px; text-align: left;";
const CELL_STYLE: &str = "border: 1px solid #ddd; padding: 6px 10px; font-family: monospace;";
const GROUP_STYLE: &str = "color: #333; font-size: 1em; margin: 12px 0 6px 0;";

/// Escape HTML special characters, quotes included
pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Color for a change direction: positive is an improvement, negative a regression
fn change_color(change: i32) -> &'static str {
    match change.signum() {
        1 => "#2e7d32",
        -1 => "#c62828",
        _ => "#555",
    }
}

pub fn render_html(tables: &[ComparisonTable]) -> String {
    let mut html = String::new();

    for table in tables {
        let label = table.group_label();
        if !label.is_empty() {
            html.push_str(&format!(
                "<h3 style=\"{}\">{}</h3>\n",
                GROUP_STYLE,
                escape_html(&label)
            ));
        }

        html.push_str(&format!("<table class=\"benchstat\" style=\"{}\">\n", TABLE_STYLE));
        html.push_str("<thead><tr>");
        for heading in [
            "name".to_string(),
            format!("old {}", table.metric),
            format!("new {}", table.metric),
            "delta".to_string(),
        ] {
            html.push_str(&format!(
                "<th style=\"{}\">{}</th>",
                HEADER_STYLE,
                escape_html(&heading)
            ));
        }
        html.push_str("</tr></thead>\n<tbody>\n");

        for row in &table.rows {
            html.push_str(&format!(
                "<tr><td style=\"{cell}\">{}</td><td style=\"{cell}\">{}</td>\
                 <td style=\"{cell}\">{}</td><td style=\"{cell} color: {};\">{}</td></tr>\n",
                escape_html(&row.benchmark),
                escape_html(&row.before),
                escape_html(&row.after),
                change_color(row.change),
                escape_html(&delta_cell(row)),
                cell = CELL_STYLE,
            ));
        }

        html.push_str("</tbody>\n</table>\n");
    }

    html
}
