// Fixed-layout text report, one block per table:
//
//   pkg:example.com/foo goos:linux goarch:amd64
//   name            old time/op  new time/op  delta
//   BenchmarkFoo-8  120ns ± 1%   600ns ± 2%   +400.00%  (p=0.008)

use super::delta_cell;
use crate::comparison::ComparisonTable;
use std::fmt::Write;

const COLUMN_GAP: usize = 2;

pub fn render_text(tables: &[ComparisonTable]) -> String {
    let mut out = String::new();

    for (i, table) in tables.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_table(&mut out, table);
    }

    out
}

fn render_table(out: &mut String, table: &ComparisonTable) {
    let label = table.group_label();
    if !label.is_empty() {
        out.push_str(&label);
        out.push('\n');
    }

    let header = [
        "name".to_string(),
        format!("old {}", table.metric),
        format!("new {}", table.metric),
        "delta".to_string(),
    ];
    let rows: Vec<[String; 4]> = table
        .rows
        .iter()
        .map(|row| {
            [
                row.benchmark.clone(),
                row.before.clone(),
                row.after.clone(),
                delta_cell(row),
            ]
        })
        .collect();

    let mut widths = [0usize; 4];
    for row in std::iter::once(&header).chain(&rows) {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    write_line(out, &header, &widths);
    for row in &rows {
        write_line(out, row, &widths);
    }
}

fn write_line(out: &mut String, cells: &[String; 4], widths: &[usize; 4]) {
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if i + 1 == cells.len() {
            line.push_str(cell);
        } else {
            let _ = write!(line, "{:<pad$}", cell, pad = width + COLUMN_GAP);
        }
    }
    out.push_str(line.trim_end());
    out.push('\n');
}
