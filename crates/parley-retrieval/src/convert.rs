//! One-off corpus converter: flatten HTML tables into markdown records.
//!
//! Source exports often carry `rowspan` cells, which scatter a record's
//! fields across rows and ruin keyword retrieval. This module re-inflates
//! those cells so every output row is a complete record, then renders one
//! markdown section per row. Used by the `corpus-convert` binary, not by the
//! live conversation path.

use scraper::{Html, Selector};
use std::collections::HashMap;

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Flatten every table in the document into complete rows, carrying
/// `rowspan` cell values down into the rows they span.
pub fn flatten_tables(raw: &str) -> Vec<Vec<String>> {
    let document = Html::parse_document(raw);
    let table_sel = Selector::parse("table").expect("static selector");
    let row_sel = Selector::parse("tr").expect("static selector");
    let cell_sel = Selector::parse("td, th").expect("static selector");

    let mut all_rows = Vec::new();
    for table in document.select(&table_sel) {
        // col index -> (value, rows it still spans)
        let mut carry: HashMap<usize, (String, usize)> = HashMap::new();
        for tr in table.select(&row_sel) {
            let mut row: Vec<String> = Vec::new();
            let mut col = 0usize;

            for cell in tr.select(&cell_sel) {
                // flush carried cells occupying columns before this one
                while let Some((value, remaining)) = carry.remove(&col) {
                    row.push(value.clone());
                    if remaining > 1 {
                        carry.insert(col, (value, remaining - 1));
                    }
                    col += 1;
                }
                let text = collapse_ws(&cell.text().collect::<String>());
                let rowspan = cell
                    .value()
                    .attr("rowspan")
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(1);
                if rowspan > 1 {
                    carry.insert(col, (text.clone(), rowspan - 1));
                }
                row.push(text);
                col += 1;
            }
            // trailing carried cells after the last real cell
            while let Some((value, remaining)) = carry.remove(&col) {
                row.push(value.clone());
                if remaining > 1 {
                    carry.insert(col, (value, remaining - 1));
                }
                col += 1;
            }

            if row.iter().any(|c| !c.is_empty()) {
                all_rows.push(row);
            }
        }
    }
    all_rows
}

/// Render flattened rows as flat markdown records. The first row supplies the
/// field labels; each later row becomes one `##` section with a bullet per
/// non-empty field. Rows with fewer than `min_cells` non-empty cells are
/// treated as layout noise; identical rows are emitted once.
pub fn rows_to_markdown(rows: &[Vec<String>], title: &str, min_cells: usize) -> String {
    let mut lines = vec![
        format!("# {}\n", title),
        "> Auto-generated flat records; one section per source table row.\n\n".to_string(),
    ];

    let Some((headers, records)) = rows.split_first() else {
        return lines.join("");
    };

    let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
    for record in records {
        let useful = record.iter().filter(|c| !c.trim().is_empty()).count();
        if useful < min_cells {
            continue;
        }
        let key = record.join("|");
        if !seen.insert(key) {
            continue;
        }

        let section = record
            .iter()
            .find(|c| !c.trim().is_empty())
            .map(String::as_str)
            .unwrap_or("Entry");
        lines.push(format!("## {}\n", section));
        for (label, value) in headers.iter().zip(record.iter()) {
            if !value.trim().is_empty() {
                lines.push(format!("- **{}**: {}\n", label, value));
            }
        }
        lines.push("\n".to_string());
    }

    lines.join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_table_flattens_row_per_row() {
        let rows = flatten_tables(
            "<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>",
        );
        assert_eq!(rows, vec![vec!["A", "B"], vec!["1", "2"]]);
    }

    #[test]
    fn rowspan_value_carries_into_spanned_rows() {
        let html = r#"
            <table>
              <tr><td rowspan="2">Campus X</td><td>CSE</td></tr>
              <tr><td>ECE</td></tr>
            </table>"#;
        let rows = flatten_tables(html);
        assert_eq!(rows[0], vec!["Campus X", "CSE"]);
        assert_eq!(rows[1], vec!["Campus X", "ECE"]);
    }

    #[test]
    fn rowspan_three_spans_two_following_rows() {
        let html = r#"
            <table>
              <tr><td rowspan="3">X</td><td>a</td></tr>
              <tr><td>b</td></tr>
              <tr><td>c</td></tr>
            </table>"#;
        let rows = flatten_tables(html);
        assert_eq!(rows[1], vec!["X", "b"]);
        assert_eq!(rows[2], vec!["X", "c"]);
    }

    #[test]
    fn markdown_records_use_header_labels_and_dedupe() {
        let rows = vec![
            vec!["Name".to_string(), "Dept".to_string()],
            vec!["Dr. A".to_string(), "CSE".to_string()],
            vec!["Dr. A".to_string(), "CSE".to_string()],
        ];
        let md = rows_to_markdown(&rows, "Faculty", 1);
        assert_eq!(md.matches("## Dr. A").count(), 1);
        assert!(md.contains("- **Name**: Dr. A"));
        assert!(md.contains("- **Dept**: CSE"));
    }

    #[test]
    fn sparse_rows_are_skipped_by_min_cells() {
        let rows = vec![
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            vec!["x".to_string(), String::new(), String::new()],
        ];
        let md = rows_to_markdown(&rows, "T", 3);
        assert!(!md.contains("## x"));
    }
}
