//! Corpus ingestion: turn a directory of mixed text sources into chunks.
//!
//! Markup files yield two kinds of blocks: one dense single-line block per
//! table row (so a record's fields stay together in one chunk) plus one block
//! of the remaining stripped text. Files that fail to read are logged and
//! skipped; an unreadable file never aborts startup on its own.

use crate::chunk::{chunk_block, DocumentChunk};
use crate::index::RetrievalError;
use scraper::{Html, Selector};
use std::path::Path;
use tracing::{info, warn};

/// Extensions handed to the markup loader. Everything else is ignored.
const TEXT_EXTENSIONS: &[&str] = &["md", "html", "htm", "txt"];

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract every table row as one " | "-joined line of cell text. Rows with
/// no non-empty cells are dropped.
pub fn extract_table_rows(raw: &str) -> Vec<String> {
    let document = Html::parse_document(raw);
    let row_sel = Selector::parse("tr").expect("static selector");
    let cell_sel = Selector::parse("td, th").expect("static selector");

    let mut rows = Vec::new();
    for tr in document.select(&row_sel) {
        let cells: Vec<String> = tr
            .select(&cell_sel)
            .map(|cell| collapse_ws(&cell.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .collect();
        if !cells.is_empty() {
            rows.push(cells.join(" | "));
        }
    }
    rows
}

/// Strip all markup, decode entities, and collapse whitespace. Plain text
/// passes through unchanged apart from whitespace normalization.
pub fn strip_markup(raw: &str) -> String {
    let document = Html::parse_document(raw);
    collapse_ws(&document.root_element().text().collect::<String>())
}

/// Load every supported file under `dir` (sorted by name for deterministic
/// chunk order) and chunk it. The result may be empty; `RetrievalIndex::build`
/// decides whether that is fatal.
pub fn load_corpus(dir: &Path, chunk_size: usize) -> Result<Vec<DocumentChunk>, RetrievalError> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut chunks = Vec::new();
    for path in paths {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !TEXT_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(file = %source, error = %e, "could not read corpus file; skipping");
                continue;
            }
        };

        let mut blocks = extract_table_rows(&raw);
        blocks.push(strip_markup(&raw));

        let before = chunks.len();
        for block in &blocks {
            chunks.extend(chunk_block(&source, block, chunk_size));
        }
        info!(file = %source, chunks = chunks.len() - before, "loaded corpus file");
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE_HTML: &str = r#"
        <table>
          <tr><th>Name</th><th>Department</th></tr>
          <tr><td>Dr. V Lakshmi Chetana</td><td>CSE</td></tr>
          <tr><td>  </td><td> </td></tr>
        </table>
        <p>Remaining &amp; stripped text.</p>
    "#;

    #[test]
    fn table_rows_become_dense_single_lines() {
        let rows = extract_table_rows(TABLE_HTML);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], "Name | Department");
        assert_eq!(rows[1], "Dr. V Lakshmi Chetana | CSE");
    }

    #[test]
    fn record_fields_stay_in_one_row() {
        let rows = extract_table_rows(TABLE_HTML);
        let record = &rows[1];
        assert!(record.contains("Lakshmi Chetana") && record.contains("CSE"));
    }

    #[test]
    fn strip_markup_removes_tags_and_decodes_entities() {
        let plain = strip_markup("<p>Hello &amp; <b>world</b></p>");
        assert_eq!(plain, "Hello & world");
    }

    #[test]
    fn strip_markup_keeps_plain_text() {
        assert_eq!(strip_markup("just   some\ntext"), "just some text");
    }

    #[test]
    fn empty_rows_are_dropped() {
        let rows = extract_table_rows("<table><tr><td></td></tr></table>");
        assert!(rows.is_empty());
    }
}
