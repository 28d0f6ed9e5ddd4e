//! Plain-text tables for terminal output. Numeric cells are right-aligned,
//! everything else is left-aligned.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::data::parse_number;

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, false));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, false));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, true));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize], align_numbers: bool) -> String {
    let mut cells = Vec::with_capacity(widths.len());
    for (idx, width) in widths.iter().enumerate() {
        let value = values.get(idx).map(String::as_str).unwrap_or("");
        let sanitized = sanitize_cell(value);
        let padding = " ".repeat(width.saturating_sub(display_width(&sanitized)));
        if align_numbers && is_numeric_cell(&sanitized) {
            cells.push(format!("{padding}{sanitized}"));
        } else {
            cells.push(format!("{sanitized}{padding}"));
        }
    }
    cells.join("  ").trim_end().to_string()
}

fn is_numeric_cell(value: &str) -> bool {
    let value = value.strip_suffix('%').unwrap_or(value);
    parse_number(value).is_some()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn numbers_align_right_text_left() {
        let headers = strings(&["region", "total"]);
        let rows = vec![strings(&["west", "5"]), strings(&["east", "1200"])];
        let rendered = render_table(&headers, &rows);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "region  total");
        assert_eq!(lines[1], "------  -----");
        assert_eq!(lines[2], "west        5");
        assert_eq!(lines[3], "east     1200");
    }

    #[test]
    fn short_rows_and_control_characters() {
        let headers = strings(&["note", "n"]);
        let rows = vec![strings(&["line1\nline2"])];
        let rendered = render_table(&headers, &rows);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[2], "line1 line2");
    }

    #[test]
    fn percentages_count_as_numeric() {
        assert!(is_numeric_cell("80.00%"));
        assert!(is_numeric_cell("1,200"));
        assert!(!is_numeric_cell("a (2)"));
    }
}
