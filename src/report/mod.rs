//! Change report rendering
//!
//! Both renderings show exactly the rows they are given; filtering happens
//! upstream in [`crate::comparison::ChangeFilter`].

mod html;
mod text;

pub(crate) use html::escape_html;
pub use html::render_html;
pub use text::render_text;

use crate::comparison::ComparisonTable;
use serde::Serialize;

/// Plain-text and rich-text renderings of the same tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub text: String,
    pub html: String,
}

pub fn render(tables: &[ComparisonTable]) -> Report {
    Report {
        text: render_text(tables),
        html: render_html(tables),
    }
}

/// Delta cell with the p-value appended when the comparator reported one
pub(crate) fn delta_cell(row: &crate::comparison::ComparisonRow) -> String {
    match row.p_value {
        Some(p) => format!("{}  (p={:.3})", row.delta, p),
        None => row.delta.clone(),
    }
}
