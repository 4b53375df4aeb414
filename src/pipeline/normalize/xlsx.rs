//! `.xlsx` to tab-separated text.

use super::ConvertError;
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use std::path::Path;

/// Convert every worksheet of the workbook at `path` to text.
///
/// Each sheet starts with a `Sheet: <name>` line followed by one line per
/// row, cells separated by tabs. Rows and columns are counted from A1 so
/// the layout matches what a spreadsheet shows, with empty cells as empty
/// strings.
pub fn xlsx_to_text(path: &Path) -> Result<String, ConvertError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let mut out = String::new();

    for name in workbook.sheet_names().to_owned() {
        let range = workbook.worksheet_range(&name)?;
        out.push_str("Sheet: ");
        out.push_str(&name);
        out.push('\n');
        write_rows(&range, &mut out);
    }
    Ok(out)
}

fn write_rows(range: &Range<Data>, out: &mut String) {
    let Some((last_row, last_col)) = range.end() else {
        return;
    };
    for row in 0..=last_row {
        let line: Vec<String> = (0..=last_col)
            .map(|col| range.get_value((row, col)).map(cell_text).unwrap_or_default())
            .collect();
        out.push_str(&line.join("\t"));
        out.push('\n');
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}
