use crate::forms::io_common::{column_letters, normalize_label, parse_column_letters};
use crate::forms::*;

use chrono::{Local, NaiveDate};
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value as JSValue;
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fs;

/// Row holding the preparer name, rank and initials.
pub const PREPARER_ROW: u32 = 2;
/// Row holding the approver name and rank.
pub const APPROVER_ROW: u32 = 4;
pub const HEADER_ROW: u32 = 5;
pub const FIRST_DATA_ROW: u32 = 6;

/// The columns of the roster that are read.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Column {
    Name,
    Rank,
    Gender,
    Age,
    Height,
    Weight,
    AcftExempt,
    MaxWeight,
    Screening,
    First,
    Second,
    Third,
    Average,
    BodyFatPercentage,
    BodyFatStandard,
    TapeResult,
    PreparedBy,
    PreparerRank,
    ApprovedBy,
    ApproverRank,
}

impl Column {
    pub const ALL: [Column; 20] = [
        Column::Name,
        Column::Rank,
        Column::Gender,
        Column::Age,
        Column::Height,
        Column::Weight,
        Column::AcftExempt,
        Column::MaxWeight,
        Column::Screening,
        Column::First,
        Column::Second,
        Column::Third,
        Column::Average,
        Column::BodyFatPercentage,
        Column::BodyFatStandard,
        Column::TapeResult,
        Column::PreparedBy,
        Column::PreparerRank,
        Column::ApprovedBy,
        Column::ApproverRank,
    ];

    /// The key of the column in a layout file.
    pub fn key(&self) -> &'static str {
        match self {
            Column::Name => "name",
            Column::Rank => "rank",
            Column::Gender => "gender",
            Column::Age => "age",
            Column::Height => "height",
            Column::Weight => "weight",
            Column::AcftExempt => "acftExempt",
            Column::MaxWeight => "maxWeight",
            Column::Screening => "screening",
            Column::First => "first",
            Column::Second => "second",
            Column::Third => "third",
            Column::Average => "average",
            Column::BodyFatPercentage => "bodyFatPercentage",
            Column::BodyFatStandard => "bodyFatStandard",
            Column::TapeResult => "tapeResult",
            Column::PreparedBy => "preparedBy",
            Column::PreparerRank => "preparerRank",
            Column::ApprovedBy => "approvedBy",
            Column::ApproverRank => "approverRank",
        }
    }

    pub fn from_key(key: &str) -> Option<Column> {
        Column::ALL.iter().find(|c| c.key() == key).cloned()
    }

    /// The 1-based position in the standard roster. Column 15 is not read.
    pub fn default_position(&self) -> u32 {
        match self {
            Column::Name => 1,
            Column::Rank => 2,
            Column::Gender => 3,
            Column::Age => 4,
            Column::Height => 5,
            Column::Weight => 6,
            Column::AcftExempt => 7,
            Column::MaxWeight => 8,
            Column::Screening => 9,
            Column::First => 10,
            Column::Second => 11,
            Column::Third => 12,
            Column::Average => 13,
            Column::BodyFatPercentage => 14,
            Column::BodyFatStandard => 16,
            Column::TapeResult => 17,
            Column::PreparedBy => 18,
            Column::PreparerRank => 19,
            Column::ApprovedBy => 20,
            Column::ApproverRank => 21,
        }
    }

    /// The columns the compliance decision depends on. They must be found in the header.
    pub fn required(&self) -> bool {
        matches!(
            self,
            Column::Name
                | Column::Gender
                | Column::Weight
                | Column::AcftExempt
                | Column::MaxWeight
                | Column::Screening
                | Column::BodyFatPercentage
                | Column::BodyFatStandard
                | Column::TapeResult
        )
    }

    /// Accepted header labels, in normalized form.
    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::Name => &["name", "soldier", "soldier name", "full name"],
            Column::Rank => &["rank", "grade", "rank grade"],
            Column::Gender => &["gender", "sex", "m f"],
            Column::Age => &["age"],
            Column::Height => &["height", "height in", "height inches"],
            Column::Weight => &["weight", "weight lbs", "current weight"],
            Column::AcftExempt => &[
                "acft",
                "acft exempt",
                "acft exemption",
                "acft exemption eligible",
                "acft 540",
            ],
            Column::MaxWeight => &[
                "max weight",
                "maximum weight",
                "max allowable weight",
                "maximum allowable weight",
                "screening table weight",
            ],
            Column::Screening => &[
                "height weight",
                "ht wt",
                "height weight result",
                "ht wt result",
                "screening",
                "screening result",
            ],
            Column::First => &["first", "1st", "reading 1", "measurement 1"],
            Column::Second => &["second", "2nd", "reading 2", "measurement 2"],
            Column::Third => &["third", "3rd", "reading 3", "measurement 3"],
            Column::Average => &["average", "avg", "average measurement"],
            Column::BodyFatPercentage => &[
                "body fat",
                "body fat percentage",
                "body fat percent",
                "bf",
            ],
            Column::BodyFatStandard => &[
                "body fat standard",
                "bf standard",
                "standard",
                "allowable body fat",
                "max body fat",
            ],
            Column::TapeResult => &["tape", "tape result", "tape test", "tape test result"],
            Column::PreparedBy => &["prepared by", "preparer"],
            Column::PreparerRank => &["prep by rank", "preparer rank", "prepared by rank"],
            Column::ApprovedBy => &["approved by", "approved by supervisor", "approver", "supervisor"],
            Column::ApproverRank => &["appr by rank", "approver rank", "approved by rank", "supervisor rank"],
        }
    }
}

/// How the columns of the roster are found.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LayoutChoice {
    /// Match the labels of the header row.
    Detect,
    /// The standard column order, without looking at the header.
    Positional,
    /// A JSON layout file.
    File(String),
}

impl LayoutChoice {
    pub fn from_arg(arg: Option<&str>) -> LayoutChoice {
        match arg {
            None => LayoutChoice::Detect,
            Some(s) if s.eq_ignore_ascii_case("positional") => LayoutChoice::Positional,
            Some(path) => LayoutChoice::File(path.to_string()),
        }
    }
}

/// Where each column is found in the worksheet.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnLayout {
    /// 1-based row of the first Soldier.
    pub first_data_row: u32,
    // 0-based column indexes. A missing column is read as blank.
    columns: BTreeMap<Column, u32>,
}

impl ColumnLayout {
    pub fn positional() -> ColumnLayout {
        ColumnLayout {
            first_data_row: FIRST_DATA_ROW,
            columns: Column::ALL
                .iter()
                .map(|c| (*c, c.default_position() - 1))
                .collect(),
        }
    }

    /// The 0-based column index.
    pub fn position(&self, c: Column) -> Option<u32> {
        self.columns.get(&c).cloned()
    }

    /// Finds every column by its label in the header row.
    ///
    /// `header` holds the 0-based column index and the label of every non-blank header cell.
    pub fn detect(header: &[(u32, String)]) -> FormsResult<ColumnLayout> {
        let labels: Vec<(u32, String)> = header
            .iter()
            .map(|(idx, s)| (*idx, normalize_label(s)))
            .collect();
        debug!("ColumnLayout::detect: labels: {:?}", labels);
        let mut columns: BTreeMap<Column, u32> = BTreeMap::new();
        let mut missing: Vec<String> = Vec::new();
        for c in Column::ALL {
            let found = labels
                .iter()
                .find(|(_, label)| c.aliases().contains(&label.as_str()))
                .map(|(idx, _)| *idx);
            match found {
                Some(idx) => {
                    debug!(
                        "ColumnLayout::detect: {} -> column {}",
                        c.key(),
                        column_letters(idx)
                    );
                    columns.insert(c, idx);
                }
                None if c.required() => missing.push(c.key().to_string()),
                None => {
                    info!("Column '{}' not found in the header, it will be left blank", c.key());
                }
            }
        }
        if !missing.is_empty() {
            return HeaderMismatchSnafu {
                row: HEADER_ROW,
                missing: missing.join(", "),
            }
            .fail();
        }
        Ok(ColumnLayout {
            first_data_row: FIRST_DATA_ROW,
            columns,
        })
    }

    pub fn from_file(path: &str) -> FormsResult<ColumnLayout> {
        let contents = fs::read_to_string(path).context(OpeningLayoutSnafu { path })?;
        let lf: LayoutFile =
            serde_json::from_str(contents.as_str()).context(ParsingLayoutSnafu { path })?;
        debug!("ColumnLayout::from_file: {:?}", lf);
        lf.into_layout()
    }
}

/// The content of a layout file.
///
/// ```json
/// { "firstDataRow": 6, "columns": { "name": "A", "tapeResult": 17 } }
/// ```
/// The header row is not read: the file replaces header detection.
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct LayoutFile {
    #[serde(rename = "firstDataRow")]
    pub first_data_row: Option<u32>,
    /// Column key to 1-based index or column letters. Missing keys keep the standard position.
    pub columns: Option<BTreeMap<String, JSValue>>,
}

impl LayoutFile {
    pub fn into_layout(self) -> FormsResult<ColumnLayout> {
        let mut layout = ColumnLayout::positional();
        if let Some(r) = self.first_data_row {
            ensure_whatever!(r >= 1, "firstDataRow must be at least 1, got {}", r);
            layout.first_data_row = r;
        }
        for (key, value) in self.columns.unwrap_or_default() {
            let c = Column::from_key(&key).context(InvalidColumnSnafu {
                key: key.clone(),
                value: value.to_string(),
            })?;
            let idx = read_column_ref(&value).context(InvalidColumnSnafu {
                key: key.clone(),
                value: value.to_string(),
            })?;
            layout.columns.insert(c, idx);
        }
        Ok(layout)
    }
}

/// 1-based index (number or numeric string) or Excel letters, to a 0-based index.
fn read_column_ref(x: &JSValue) -> Option<u32> {
    match x {
        JSValue::Number(n) => n
            .as_u64()
            .filter(|x| *x >= 1 && *x <= u32::MAX as u64)
            .map(|x| (x - 1) as u32),
        JSValue::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()) => {
            parse_column_letters(s)
        }
        JSValue::String(s) => s
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|x| *x >= 1)
            .map(|x| x - 1),
        _ => None,
    }
}

/// The date written on the forms, as YYYYMMDD. Defaults to today.
pub fn form_date(arg: Option<&str>) -> FormsResult<String> {
    match arg {
        Some(s) => {
            let d = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .context(InvalidDateSnafu { value: s })?;
            Ok(d.format("%Y%m%d").to_string())
        }
        None => Ok(Local::now().format("%Y%m%d").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(labels: &[&str]) -> Vec<(u32, String)> {
        labels
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(idx, s)| (idx as u32, s.to_string()))
            .collect()
    }

    #[test]
    fn positional_layout() {
        let layout = ColumnLayout::positional();
        assert_eq!(layout.position(Column::Name), Some(0));
        assert_eq!(layout.position(Column::BodyFatPercentage), Some(13));
        assert_eq!(layout.position(Column::BodyFatStandard), Some(15));
        assert_eq!(layout.position(Column::ApproverRank), Some(20));
        assert_eq!(layout.first_data_row, 6);
    }

    #[test]
    fn detect_columns_in_any_order() {
        let h = header(&[
            "Rank",
            "NAME",
            "Sex",
            "Weight (lbs)",
            "ACFT Exempt",
            "Max Weight",
            "Height/Weight",
            "Body Fat %",
            "",
            "Body Fat Standard",
            "Tape Result",
        ]);
        let layout = ColumnLayout::detect(&h).unwrap();
        assert_eq!(layout.position(Column::Name), Some(1));
        assert_eq!(layout.position(Column::Rank), Some(0));
        assert_eq!(layout.position(Column::Gender), Some(2));
        assert_eq!(layout.position(Column::Weight), Some(3));
        assert_eq!(layout.position(Column::Screening), Some(6));
        assert_eq!(layout.position(Column::BodyFatPercentage), Some(7));
        assert_eq!(layout.position(Column::BodyFatStandard), Some(9));
        assert_eq!(layout.position(Column::TapeResult), Some(10));
        assert_eq!(layout.position(Column::Age), None);
    }

    #[test]
    fn detect_fails_on_missing_columns() {
        let h = header(&["Name", "Gender", "Weight"]);
        match ColumnLayout::detect(&h) {
            Err(FormsError::HeaderMismatch { missing, .. }) => {
                assert!(missing.contains("tapeResult"), "{}", missing);
                assert!(!missing.contains("gender"), "{}", missing);
            }
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn layout_file_overrides_positions() {
        let lf: LayoutFile = serde_json::from_str(
            r#"{"firstDataRow": 8, "columns": {"approvedBy": "U", "approverRank": 22, "tapeResult": "aa", "age": "4"}}"#,
        )
        .unwrap();
        let layout = lf.into_layout().unwrap();
        assert_eq!(layout.first_data_row, 8);
        assert_eq!(layout.position(Column::ApprovedBy), Some(20));
        assert_eq!(layout.position(Column::ApproverRank), Some(21));
        assert_eq!(layout.position(Column::TapeResult), Some(26));
        assert_eq!(layout.position(Column::Age), Some(3));
        assert_eq!(layout.position(Column::Name), Some(0));
    }

    #[test]
    fn layout_file_does_not_move_the_header() {
        let lf: LayoutFile = serde_json::from_str(r#"{"headerRow": 9}"#).unwrap();
        assert_eq!(lf.into_layout().unwrap(), ColumnLayout::positional());
    }

    #[test]
    fn layout_file_rejects_unknown_keys() {
        let lf: LayoutFile =
            serde_json::from_str(r#"{"columns": {"shoeSize": 3}}"#).unwrap();
        assert!(matches!(
            lf.into_layout(),
            Err(FormsError::InvalidColumn { .. })
        ));
        let lf: LayoutFile = serde_json::from_str(r#"{"columns": {"name": 0}}"#).unwrap();
        assert!(lf.into_layout().is_err());
    }

    #[test]
    fn dates() {
        assert_eq!(form_date(Some("2024-05-01")).unwrap(), "20240501");
        assert!(matches!(
            form_date(Some("05/01/2024")),
            Err(FormsError::InvalidDate { .. })
        ));
        assert!(form_date(Some("2024-02-30")).is_err());
        assert_eq!(form_date(None).unwrap().len(), 8);
    }

    #[test]
    fn layout_choice() {
        assert_eq!(LayoutChoice::from_arg(None), LayoutChoice::Detect);
        assert_eq!(
            LayoutChoice::from_arg(Some("Positional")),
            LayoutChoice::Positional
        );
        assert_eq!(
            LayoutChoice::from_arg(Some("layout.json")),
            LayoutChoice::File("layout.json".to_string())
        );
    }
}
