use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

/// Spreadsheet text: cells joined with `" | "` per row, rows per sheet,
/// each sheet prefixed with its name.
pub fn extract_workbook(bytes: &[u8]) -> Result<String, String> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| format!("invalid spreadsheet: {e}"))?;

    let mut parts = Vec::new();
    for name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| format!("failed to read sheet '{name}': {e}"))?;

        let mut rows = Vec::new();
        for row in range.rows() {
            let cells: Vec<String> = row
                .iter()
                .filter(|cell| !matches!(cell, Data::Empty))
                .map(|cell| cell.to_string())
                .collect();
            if !cells.is_empty() {
                rows.push(cells.join(" | "));
            }
        }
        if !rows.is_empty() {
            parts.push(format!("Sheet: {name}\n{}", rows.join("\n")));
        }
    }
    Ok(parts.join("\n\n"))
}

/// CSV rows joined with `" | "`, headerless.
pub fn extract_csv(bytes: &[u8]) -> Result<String, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| format!("invalid csv: {e}"))?;
        let cells: Vec<&str> = record
            .iter()
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .collect();
        if !cells.is_empty() {
            rows.push(cells.join(" | "));
        }
    }
    Ok(rows.join("\n"))
}
