// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

/// The content of a non-blank spreadsheet cell.
///
/// Blank cells are represented by `None` wherever a `CellValue` is expected.
#[derive(PartialEq, Debug, Clone)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl CellValue {
    /// Drops the value if it is a blank string.
    pub fn non_blank(self) -> Option<CellValue> {
        match self {
            CellValue::Text(s) if s.trim().is_empty() => None,
            x => Some(x),
        }
    }

    /// The numeric content of the cell. Text is parsed after trimming.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(f) if f.is_finite() => Some(*f),
            CellValue::Number(_) => None,
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        }
    }

    /// True if the trimmed text of the cell is exactly `expected`.
    pub fn is(&self, expected: &str) -> bool {
        match self {
            CellValue::Text(s) => s.trim() == expected,
            CellValue::Number(_) => false,
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Text(s) => write!(f, "{}", s),
            // Spreadsheets store every number as a float: 180 must not come out as 180.0
            CellValue::Number(x) if x.fract() == 0.0 && x.abs() < 1e15 => {
                write!(f, "{}", *x as i64)
            }
            CellValue::Number(x) => write!(f, "{}", x),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(x: f64) -> Self {
        CellValue::Number(x)
    }
}

impl From<i64> for CellValue {
    fn from(x: i64) -> Self {
        CellValue::Number(x as f64)
    }
}

impl From<i32> for CellValue {
    fn from(x: i32) -> Self {
        CellValue::Number(x as f64)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Accepts `M` or `F` in any case, surrounded by any whitespace.
    pub fn parse(s: &str) -> Option<Gender> {
        match s.trim().to_uppercase().as_str() {
            "M" => Some(Gender::Male),
            "F" => Some(Gender::Female),
            _ => None,
        }
    }
}

/// The two fillable worksheets. DA Form 5500 is used for male Soldiers,
/// DA Form 5501 for female Soldiers.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum FormTemplate {
    Male5500,
    Female5501,
}

impl FormTemplate {
    pub fn form_number(&self) -> &'static str {
        match self {
            FormTemplate::Male5500 => "5500",
            FormTemplate::Female5501 => "5501",
        }
    }
}

impl From<Gender> for FormTemplate {
    fn from(g: Gender) -> Self {
        match g {
            Gender::Male => FormTemplate::Male5500,
            Gender::Female => FormTemplate::Female5501,
        }
    }
}

/// One row of the roster.
///
/// Every field except the name may be blank.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Record {
    pub name: String,
    pub rank: Option<CellValue>,
    pub gender: Option<CellValue>,
    pub age: Option<CellValue>,
    pub height: Option<CellValue>,
    pub weight: Option<CellValue>,
    /// `Yes` when the Soldier scored high enough on the ACFT to be exempt.
    pub acft_exempt: Option<CellValue>,
    pub max_weight: Option<CellValue>,
    /// Outcome of the height/weight screening: `Pass`, `Needs Tape`, or anything else.
    pub screening: Option<CellValue>,
    /// The three circumference measurements.
    pub readings: [Option<CellValue>; 3],
    pub average: Option<CellValue>,
    /// Body fat as a fraction (0.22 for 22%).
    pub body_fat_percentage: Option<CellValue>,
    /// Maximum allowable body fat as a fraction.
    pub body_fat_standard: Option<CellValue>,
    /// Outcome of the tape test: `Pass`, `Fail Tape` or blank.
    pub tape_result: Option<CellValue>,
    pub prepared_by: Option<CellValue>,
    pub preparer_rank: Option<CellValue>,
    pub approved_by: Option<CellValue>,
    pub approver_rank: Option<CellValue>,
}

/// The preparer and approver written on every form, unless a row overrides them.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Signatories {
    pub prepared_by: Option<CellValue>,
    pub preparer_rank: Option<CellValue>,
    pub preparer_initials: Option<CellValue>,
    pub approved_by: Option<CellValue>,
    pub approver_rank: Option<CellValue>,
}

// ******** Output data structures *********

/// The fields of the worksheets that this program writes to.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum FieldName {
    Date1,
    Date2,
    PreparedBy,
    PrepByRank,
    ApprovedBySupervisor,
    ApprByRank,
    Name,
    Rank,
    Age,
    Height,
    Weight,
    Weight1,
    First,
    Second,
    Third,
    Average,
    Average1,
    BodyFatPercentage,
    BodyFatStandard,
    Remarks,
    InCompliance,
    NotInCompliance,
    PreparerInitials,
}

impl FieldName {
    pub const ALL: [FieldName; 23] = [
        FieldName::Date1,
        FieldName::Date2,
        FieldName::PreparedBy,
        FieldName::PrepByRank,
        FieldName::ApprovedBySupervisor,
        FieldName::ApprByRank,
        FieldName::Name,
        FieldName::Rank,
        FieldName::Age,
        FieldName::Height,
        FieldName::Weight,
        FieldName::Weight1,
        FieldName::First,
        FieldName::Second,
        FieldName::Third,
        FieldName::Average,
        FieldName::Average1,
        FieldName::BodyFatPercentage,
        FieldName::BodyFatStandard,
        FieldName::Remarks,
        FieldName::InCompliance,
        FieldName::NotInCompliance,
        FieldName::PreparerInitials,
    ];

    /// The name of the field in the PDF form.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Date1 => "DATE1",
            FieldName::Date2 => "DATE2",
            FieldName::PreparedBy => "PREPARED BY",
            FieldName::PrepByRank => "PREP_BY_RANK",
            FieldName::ApprovedBySupervisor => "APPROVED BY SUPERVISOR",
            FieldName::ApprByRank => "APPR_BY_RANK",
            FieldName::Name => "NAME",
            FieldName::Rank => "RANK",
            FieldName::Age => "AGE",
            FieldName::Height => "HEIGHT",
            FieldName::Weight => "WEIGHT",
            FieldName::Weight1 => "WEIGHT_1",
            FieldName::First => "FIRST",
            FieldName::Second => "SECOND",
            FieldName::Third => "THIRD",
            FieldName::Average => "AVERAGE",
            FieldName::Average1 => "AVERAGE_1",
            FieldName::BodyFatPercentage => "BODY FAT PERCENTAGE",
            FieldName::BodyFatStandard => "BODY FAT STANDARD",
            FieldName::Remarks => "REMARKS",
            FieldName::InCompliance => "IN COMPLIANCE",
            FieldName::NotInCompliance => "NOT IN COMPLIANCE",
            FieldName::PreparerInitials => "Preparer's Initials",
        }
    }
}

impl Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The values to write into a form. Ordered so that two renderings of the
/// same record compare and serialize identically.
pub type FieldMap = BTreeMap<FieldName, String>;

/// Everything needed to produce the PDF of one Soldier.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FormRequest {
    pub template: FormTemplate,
    pub file_name: String,
    pub fields: FieldMap,
}

/// Reasons for leaving a record out of the output.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum RecordError {
    /// The gender column holds neither `M` nor `F`.
    UnknownGender { name: String, value: Option<String> },
}

impl Error for RecordError {}

impl Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::UnknownGender { name, value: Some(v) } => {
                write!(f, "unknown gender '{}' for {}", v, name)
            }
            RecordError::UnknownGender { name, value: None } => {
                write!(f, "missing gender for {}", name)
            }
        }
    }
}
