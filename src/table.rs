//! Terminal table rendering for `sagectl list` and `status` output.
//!
//! Columns are sized to their widest cell, the header row is bold, and
//! the status cell is colored green for online and red for offline.
//! Color escapes are applied after padding so they never skew widths.

use crate::envelope::ListEntry;

const BOLD_CYAN: &str = "\x1b[1;96m";
const GREEN: &str = "\x1b[1;92m";
const RED: &str = "\x1b[1;91m";
const RESET: &str = "\x1b[0m";

const HEADERS: [&str; 9] = [
    "SNo.", "PID", "P_NAME", "NAME", "CMD", "STATUS", "UP TIME", "CPU%", "MEM%",
];

const STATUS_COL: usize = 5;

/// Renders entries as a bordered table, one row per service.
pub fn render(entries: &[ListEntry]) -> String {
    let rows: Vec<[String; 9]> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            [
                (i + 1).to_string(),
                e.pid.to_string(),
                e.pname.clone(),
                e.name.clone(),
                e.cmd.clone(),
                e.status.clone(),
                e.uptime.clone(),
                format!("{:.2}", e.cpu_percent),
                format!("{:.2}", e.mem_percent),
            ]
        })
        .collect();

    let mut widths: [usize; 9] = HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }

    // total = per-column "| cell " plus the closing "|"
    let total: usize = widths.iter().map(|w| w + 3).sum::<usize>() + 1;
    let border = "-".repeat(total);

    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    for (header, width) in HEADERS.iter().zip(widths.iter().copied()) {
        out.push_str(&format!("| {BOLD_CYAN}{header:<width$}{RESET} "));
    }
    out.push_str("|\n");
    out.push_str(&border);
    out.push('\n');

    for row in &rows {
        for (col, (cell, width)) in row.iter().zip(widths.iter().copied()).enumerate() {
            let padded = format!("{cell:<width$}");
            if col == STATUS_COL {
                let color = if cell == "online" { GREEN } else { RED };
                out.push_str(&format!("| {color}{padded}{RESET} "));
            } else {
                out.push_str(&format!("| {padded} "));
            }
        }
        out.push_str("|\n");
    }
    out.push_str(&border);
    out
}
