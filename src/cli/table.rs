//! Table output formatting for CLI commands using comfy-table.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

/// A table with UTF-8 borders and a bold header row.
pub fn table_with_header(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(headers.iter().map(|h| Cell::new(h).add_attribute(Attribute::Bold)));
    table
}

/// Green "active" / grey "inactive" cell.
pub fn active_cell(active: bool) -> Cell {
    let (label, color) = if active { ("active", Color::Green) } else { ("inactive", Color::DarkGrey) };
    if supports_color() {
        Cell::new(label).fg(color)
    } else {
        Cell::new(label)
    }
}

/// Score cell colored by band.
pub fn score_cell(score: f64) -> Cell {
    let text = format!("{score:.1}");
    if !supports_color() {
        return Cell::new(text);
    }
    let color = if score >= 70.0 {
        Color::Green
    } else if score >= 40.0 {
        Color::Yellow
    } else {
        Color::Red
    };
    Cell::new(text).fg(color)
}

/// Check if color output is supported
fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_renders_header_and_rows() {
        let mut table = table_with_header(&["Name", "Status"]);
        table.add_row(vec![Cell::new("LatteBot"), Cell::new("active")]);
        let rendered = table.to_string();
        assert!(rendered.contains("Name"));
        assert!(rendered.contains("LatteBot"));
    }
}
