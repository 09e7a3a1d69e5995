//! Plain-text tables for the console and for text/Markdown reports.

use std::str::FromStr;

/// Column alignment. `Auto` right-aligns columns whose cells are all numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    Left,
    Right,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableStyle {
    /// Columns separated by two spaces, no rules.
    Plain,
    /// A dashed rule under the headers.
    #[default]
    Simple,
    /// `+---+` box drawing around every cell.
    Grid,
    /// Markdown pipe table.
    Pipe,
}

impl TableStyle {
    pub fn all() -> &'static [TableStyle] {
        &[
            TableStyle::Plain,
            TableStyle::Simple,
            TableStyle::Grid,
            TableStyle::Pipe,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TableStyle::Plain => "plain",
            TableStyle::Simple => "simple",
            TableStyle::Grid => "grid",
            TableStyle::Pipe => "pipe",
        }
    }
}

impl FromStr for TableStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(TableStyle::Plain),
            "simple" => Ok(TableStyle::Simple),
            "grid" => Ok(TableStyle::Grid),
            "pipe" | "markdown" | "md" => Ok(TableStyle::Pipe),
            other => Err(format!(
                "unknown table style '{}' (expected plain, simple, grid or pipe)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Per-column alignment; missing entries are `Auto`.
    pub align: Vec<Align>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            align: Vec::new(),
        }
    }

    pub fn with_align(mut self, align: Vec<Align>) -> Self {
        self.align = align;
        self
    }

    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn columns(&self) -> usize {
        self.rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }
}

/// Render `table` in the given style. Every line ends with `\n`.
pub fn render(table: &Table, style: TableStyle) -> String {
    let ncols = table.columns();
    if ncols == 0 {
        return String::new();
    }

    let headers: Vec<String> = (0..ncols)
        .map(|i| cell_text(table.headers.get(i), style))
        .collect();
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| (0..ncols).map(|i| cell_text(row.get(i), style)).collect())
        .collect();
    let aligns: Vec<Align> = (0..ncols)
        .map(|i| resolve_align(table.align.get(i).copied().unwrap_or_default(), &rows, i))
        .collect();
    let widths: Vec<usize> = (0..ncols)
        .map(|i| {
            std::iter::once(&headers[i])
                .chain(rows.iter().map(|r| &r[i]))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    match style {
        TableStyle::Plain | TableStyle::Simple => {
            push_line(&mut out, &spaced(&headers, &widths, &aligns));
            if style == TableStyle::Simple {
                let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
                push_line(&mut out, &rule.join("  "));
            }
            for row in &rows {
                push_line(&mut out, &spaced(row, &widths, &aligns));
            }
        }
        TableStyle::Grid => {
            push_line(&mut out, &grid_border(&widths, '-'));
            push_line(&mut out, &boxed(&headers, &widths, &aligns));
            push_line(&mut out, &grid_border(&widths, '='));
            for row in &rows {
                push_line(&mut out, &boxed(row, &widths, &aligns));
                push_line(&mut out, &grid_border(&widths, '-'));
            }
        }
        TableStyle::Pipe => {
            push_line(&mut out, &boxed(&headers, &widths, &aligns));
            let rule: Vec<String> = widths
                .iter()
                .zip(&aligns)
                .map(|(w, a)| match a {
                    Align::Right => format!("{}:", "-".repeat(w + 1)),
                    _ => format!(":{}", "-".repeat(w + 1)),
                })
                .collect();
            push_line(&mut out, &format!("|{}|", rule.join("|")));
            for row in &rows {
                push_line(&mut out, &boxed(row, &widths, &aligns));
            }
        }
    }
    out
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

/// Single-line cell text. Pipe tables also escape `|`.
fn cell_text(cell: Option<&String>, style: TableStyle) -> String {
    let Some(cell) = cell else {
        return String::new();
    };
    let flat: String = cell
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect();
    if style == TableStyle::Pipe {
        flat.replace('|', "\\|")
    } else {
        flat
    }
}

fn is_placeholder(cell: &str) -> bool {
    matches!(cell.trim(), "" | "-")
}

/// Numbers, optionally with thousands separators or a `%`/`s` suffix.
fn is_numeric(cell: &str) -> bool {
    let s = cell.trim();
    let s = s
        .strip_suffix('%')
        .or_else(|| s.strip_suffix('s'))
        .unwrap_or(s)
        .replace(',', "");
    s.chars().any(|c| c.is_ascii_digit()) && s.parse::<f64>().is_ok()
}

fn resolve_align(align: Align, rows: &[Vec<String>], col: usize) -> Align {
    if align != Align::Auto {
        return align;
    }
    let mut values = rows
        .iter()
        .map(|r| r[col].as_str())
        .filter(|c| !is_placeholder(c))
        .peekable();
    if values.peek().is_some() && values.all(is_numeric) {
        Align::Right
    } else {
        Align::Left
    }
}

fn pad(cell: &str, width: usize, align: Align) -> String {
    let fill = width.saturating_sub(cell.chars().count());
    match align {
        Align::Right => format!("{}{}", " ".repeat(fill), cell),
        _ => format!("{}{}", cell, " ".repeat(fill)),
    }
}

fn spaced(cells: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths.iter().zip(aligns))
        .map(|(c, (w, a))| pad(c, *w, *a))
        .collect();
    padded.join("  ").trim_end().to_string()
}

fn boxed(cells: &[String], widths: &[usize], aligns: &[Align]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths.iter().zip(aligns))
        .map(|(c, (w, a))| pad(c, *w, *a))
        .collect();
    format!("| {} |", padded.join(" | "))
}

fn grid_border(widths: &[usize], ch: char) -> String {
    let parts: Vec<String> = widths
        .iter()
        .map(|w| ch.to_string().repeat(w + 2))
        .collect();
    format!("+{}+", parts.join("+"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(["Name", "Words"]);
        table.push_row(["a.txt", "12"]);
        table.push_row(["long-name.pdf", "3"]);
        table
    }

    #[test]
    fn test_simple_right_aligns_numbers() {
        let expected = "\
Name           Words
-------------  -----
a.txt             12
long-name.pdf      3
";
        assert_eq!(render(&sample(), TableStyle::Simple), expected);
    }

    #[test]
    fn test_plain_has_no_rule() {
        let out = render(&sample(), TableStyle::Plain);
        assert_eq!(out.lines().count(), 3);
        assert!(!out.contains("---"));
        assert!(out.lines().all(|l| l == l.trim_end()));
    }

    #[test]
    fn test_grid() {
        let mut table = Table::new(["A", "B"]);
        table.push_row(["x", "10"]);
        let expected = "\
+---+----+
| A |  B |
+===+====+
| x | 10 |
+---+----+
";
        assert_eq!(render(&table, TableStyle::Grid), expected);
    }

    #[test]
    fn test_pipe_escapes_and_marks_alignment() {
        let mut table = Table::new(["File", "Words"]);
        table.push_row(["a|b", "7"]);
        let expected = "\
| File | Words |
|:-----|------:|
| a\\|b |     7 |
";
        assert_eq!(render(&table, TableStyle::Pipe), expected);
    }

    #[test]
    fn test_explicit_alignment_and_placeholders() {
        let mut table = Table::new(["Code", "Pages"]).with_align(vec![Align::Left]);
        table.push_row(["007", "-"]);
        table.push_row(["42", "10"]);
        let out = render(&table, TableStyle::Plain);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "007       -");
        assert_eq!(lines[2], "42       10");
    }

    #[test]
    fn test_multiline_cells_flattened_and_ragged_rows() {
        let mut table = Table::new(["Status"]);
        table.push_row(vec!["failed:\nbad xref", "extra"]);
        let out = render(&table, TableStyle::Plain);
        assert!(out.contains("failed: bad xref"));
        assert!(out.lines().nth(1).unwrap().ends_with("extra"));
    }

    #[test]
    fn test_unicode_width_in_chars() {
        let mut table = Table::new(["Név"]);
        table.push_row(["ő"]);
        assert_eq!(render(&table, TableStyle::Simple), "Név\n---\nő\n");
    }

    #[test]
    fn test_style_parse() {
        assert_eq!("GRID".parse::<TableStyle>().unwrap(), TableStyle::Grid);
        assert_eq!("markdown".parse::<TableStyle>().unwrap(), TableStyle::Pipe);
        assert!("fancy".parse::<TableStyle>().is_err());
        assert!(render(&Table::default(), TableStyle::Simple).is_empty());
    }
}
