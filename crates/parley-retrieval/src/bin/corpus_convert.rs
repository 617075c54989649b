//! corpus-convert: flatten HTML-table exports into retrieval-friendly markdown.
//!
//! Usage:
//!   cargo run -p parley-retrieval --bin corpus-convert -- \
//!       --input data/export.md --output data/records.md [--title "Records"] [--min-cells 3]
//!
//! The first table row supplies field labels; every later row becomes one flat
//! markdown record, with rowspan cells carried down so records stay complete.

use parley_retrieval::convert::{flatten_tables, rows_to_markdown};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut title = "Converted Records".to_string();
    let mut min_cells = 3usize;

    let mut args = std::env::args().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "--input" => input = args.next().map(PathBuf::from),
            "--output" => output = args.next().map(PathBuf::from),
            "--title" => {
                if let Some(t) = args.next() {
                    title = t;
                }
            }
            "--min-cells" => {
                if let Some(n) = args.next() {
                    min_cells = n.parse().unwrap_or(3);
                }
            }
            _ => {}
        }
    }

    let (Some(input), Some(output)) = (input, output) else {
        eprintln!("corpus-convert — flatten HTML tables into markdown records");
        eprintln!("  --input FILE      Source file containing HTML tables");
        eprintln!("  --output FILE     Destination markdown file");
        eprintln!("  --title TEXT      Document title (default: Converted Records)");
        eprintln!("  --min-cells N     Minimum non-empty cells per record (default: 3)");
        return Ok(());
    };

    let raw = std::fs::read_to_string(&input)?;
    let rows = flatten_tables(&raw);
    println!("Parsed {} table row(s) from {}", rows.len(), input.display());

    let md = rows_to_markdown(&rows, &title, min_cells);
    std::fs::write(&output, &md)?;
    println!("Written -> {} ({} chars)", output.display(), md.len());

    Ok(())
}
