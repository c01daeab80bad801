use abcp_compliance::{CellValue, Record, Signatories};
use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use log::{debug, warn};
use snafu::prelude::*;

use crate::forms::config_reader::{Column, ColumnLayout, APPROVER_ROW, PREPARER_ROW};
use crate::forms::io_common::column_letters;
use crate::forms::*;

/// Opens the named worksheet, or the first one.
pub fn get_range(path: &str, worksheet: Option<&str>) -> FormsResult<Range<DataType>> {
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;
    debug!("get_range: sheets: {:?}", workbook.sheet_names());
    match worksheet {
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { path, name })?
            .context(OpeningExcelSnafu { path }),
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path }),
    }
}

fn read_cell(cell: &DataType) -> Result<Option<CellValue>, String> {
    match cell {
        DataType::String(s) => Ok(CellValue::Text(s.clone()).non_blank()),
        DataType::Float(f) => Ok(Some(CellValue::Number(*f))),
        DataType::Int(i) => Ok(Some(CellValue::Number(*i as f64))),
        DataType::Bool(b) => Ok(Some(CellValue::Text(b.to_string()))),
        DataType::DateTime(f) => Ok(Some(CellValue::Number(*f))),
        DataType::Empty => Ok(None),
        DataType::Error(e) => Err(format!("{:?}", e)),
    }
}

/// The value at a 1-based row and a 0-based column. Cells outside the sheet are blank.
fn value_at(range: &Range<DataType>, row: u32, col: u32) -> FormsResult<Option<CellValue>> {
    match range.get_value((row - 1, col)) {
        None => Ok(None),
        Some(cell) => read_cell(cell).map_err(|content| FormsError::ExcelWrongCellType {
            row,
            column: column_letters(col),
            content,
        }),
    }
}

// A broken header cell only loses the default.
fn lenient_value_at(range: &Range<DataType>, row: u32, col: u32) -> Option<CellValue> {
    match value_at(range, row, col) {
        Ok(v) => v,
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

/// The preparer and approver written on every form.
pub fn read_signatories(range: &Range<DataType>) -> Signatories {
    let s = Signatories {
        prepared_by: lenient_value_at(range, PREPARER_ROW, 0),
        preparer_rank: lenient_value_at(range, PREPARER_ROW, 1),
        preparer_initials: lenient_value_at(range, PREPARER_ROW, 2),
        approved_by: lenient_value_at(range, APPROVER_ROW, 0),
        approver_rank: lenient_value_at(range, APPROVER_ROW, 1),
    };
    debug!("read_signatories: {:?}", s);
    s
}

/// The 0-based index and the text of every non-blank cell of a row.
pub fn read_header(range: &Range<DataType>, row: u32) -> Vec<(u32, String)> {
    let last_col = range.end().map(|(_, c)| c).unwrap_or(0);
    (0..=last_col)
        .filter_map(|col| lenient_value_at(range, row, col).map(|v| (col, v.to_string())))
        .collect()
}

/// Reads one Soldier.
///
/// Returns `None` when the name is blank: this marks the end of the roster.
pub fn read_record(
    range: &Range<DataType>,
    layout: &ColumnLayout,
    row: u32,
) -> FormsResult<Option<Record>> {
    let get = |c: Column| -> FormsResult<Option<CellValue>> {
        match layout.position(c) {
            Some(col) => value_at(range, row, col),
            None => Ok(None),
        }
    };
    let name = match get(Column::Name)? {
        Some(n) => n.to_string().trim().to_string(),
        None => return Ok(None),
    };
    let record = Record {
        name,
        rank: get(Column::Rank)?,
        gender: get(Column::Gender)?,
        age: get(Column::Age)?,
        height: get(Column::Height)?,
        weight: get(Column::Weight)?,
        acft_exempt: get(Column::AcftExempt)?,
        max_weight: get(Column::MaxWeight)?,
        screening: get(Column::Screening)?,
        readings: [
            get(Column::First)?,
            get(Column::Second)?,
            get(Column::Third)?,
        ],
        average: get(Column::Average)?,
        body_fat_percentage: get(Column::BodyFatPercentage)?,
        body_fat_standard: get(Column::BodyFatStandard)?,
        tape_result: get(Column::TapeResult)?,
        prepared_by: get(Column::PreparedBy)?,
        preparer_rank: get(Column::PreparerRank)?,
        approved_by: get(Column::ApprovedBy)?,
        approver_rank: get(Column::ApproverRank)?,
    };
    debug!("read_record: row {}: {:?}", row, record);
    Ok(Some(record))
}
