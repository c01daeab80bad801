mod config;
use log::{debug, warn};

pub mod builder;
pub mod remarks;

pub use crate::config::*;

// **** Reading the roster columns ****

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Screening {
    Pass,
    NeedsTape,
    Other,
}

impl Screening {
    fn of(cell: Option<&CellValue>) -> Screening {
        match cell {
            Some(c) if c.is("Pass") => Screening::Pass,
            Some(c) if c.is("Needs Tape") => Screening::NeedsTape,
            _ => Screening::Other,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum TapeResult {
    Pass,
    Fail,
    // Blank, or any other content.
    Unknown,
}

impl TapeResult {
    fn of(cell: Option<&CellValue>) -> TapeResult {
        match cell {
            Some(c) if c.is("Pass") => TapeResult::Pass,
            Some(c) if c.is("Fail Tape") => TapeResult::Fail,
            _ => TapeResult::Unknown,
        }
    }
}

fn is_yes(cell: Option<&CellValue>) -> bool {
    cell.map(|c| c.is("Yes")).unwrap_or(false)
}

// **** Decisions ****

/// Which rule of AR 600-9 settles the record. The first matching case applies.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Case {
    /// The height/weight screening passed: nothing else is looked at.
    HeightWeightPass,
    /// Over the screening table weight, but exempt thanks to the ACFT score.
    AcftExemption,
    /// Taped and over the body fat standard.
    TapeFailed,
    /// Taped and within the body fat standard.
    TapePassed,
    /// None of the above: no remark is written.
    Unresolved,
}

/// Body fat values as whole percentages.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct BodyFat {
    pub percentage: i64,
    pub standard: i64,
}

impl BodyFat {
    fn of(record: &Record) -> BodyFat {
        BodyFat {
            percentage: whole_percent(&record.name, record.body_fat_percentage.as_ref()),
            standard: whole_percent(&record.name, record.body_fat_standard.as_ref()),
        }
    }
}

// Blank and non-numeric cells count as zero.
fn whole_percent(name: &str, cell: Option<&CellValue>) -> i64 {
    let fraction = match cell {
        None => 0.0,
        Some(c) => c.as_f64().unwrap_or_else(|| {
            debug!("whole_percent: {}: not a number: {:?}, using 0", name, c);
            0.0
        }),
    };
    (fraction * 100.0).round() as i64
}

#[derive(PartialEq, Debug, Clone)]
pub enum Remark {
    HeightWeightPass {
        weight: CellValue,
        max_weight: CellValue,
    },
    AcftExemption,
    DidNotMeetStandards(BodyFat),
    MetStandard(BodyFat),
}

impl Remark {
    pub fn text(&self) -> String {
        match self {
            Remark::HeightWeightPass { weight, max_weight } => {
                remarks::height_weight_pass(weight, max_weight)
            }
            Remark::AcftExemption => remarks::ACFT_FAIL_HEIGHT_WEIGHT_PASS.to_string(),
            Remark::DidNotMeetStandards(bf) => {
                remarks::did_not_meet_standards(bf.percentage, bf.standard)
            }
            Remark::MetStandard(bf) => remarks::met_standard(bf.percentage, bf.standard),
        }
    }
}

/// The box checked at the bottom of the worksheet.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Compliance {
    InCompliance,
    NotInCompliance,
}

/// Everything derived from a record, before any field is written.
#[derive(PartialEq, Debug, Clone)]
pub struct Decision {
    pub case: Case,
    pub remark: Option<Remark>,
    /// Not computed when the height/weight screening passed.
    pub body_fat: Option<BodyFat>,
    pub compliance: Option<Compliance>,
    /// The weight, copied again in the tape section of the form.
    pub tape_weight: Option<CellValue>,
    pub stamp_preparer_initials: bool,
}

pub fn classify(record: &Record) -> Case {
    let screening = Screening::of(record.screening.as_ref());
    let tape = TapeResult::of(record.tape_result.as_ref());
    let acft = is_yes(record.acft_exempt.as_ref());
    match (screening, tape) {
        (Screening::Pass, _) => Case::HeightWeightPass,
        (Screening::NeedsTape, _) if acft => Case::AcftExemption,
        (Screening::NeedsTape, TapeResult::Fail) => Case::TapeFailed,
        (Screening::NeedsTape, TapeResult::Pass) => Case::TapePassed,
        _ => Case::Unresolved,
    }
}

/// Classifies a record and derives the remark, the body fat values and the compliance flag.
pub fn decide(record: &Record) -> Decision {
    let case = classify(record);
    debug!("decide: {}: case {:?}", record.name, case);

    let body_fat = match case {
        Case::HeightWeightPass => None,
        _ => Some(BodyFat::of(record)),
    };

    let remark = match (case, body_fat) {
        (Case::HeightWeightPass, _) => match (&record.weight, &record.max_weight) {
            (Some(w), Some(mw)) => Some(Remark::HeightWeightPass {
                weight: w.clone(),
                max_weight: mw.clone(),
            }),
            _ => {
                warn!(
                    "{}: weight or max weight missing, cannot fill the remarks",
                    record.name
                );
                None
            }
        },
        (Case::AcftExemption, _) => Some(Remark::AcftExemption),
        (Case::TapeFailed, Some(bf)) => Some(Remark::DidNotMeetStandards(bf)),
        (Case::TapePassed, Some(bf)) => Some(Remark::MetStandard(bf)),
        _ => None,
    };

    let screening = Screening::of(record.screening.as_ref());
    let tape = TapeResult::of(record.tape_result.as_ref());
    let exemption = case == Case::AcftExemption;
    let compliance = if screening == Screening::Pass || tape == TapeResult::Pass {
        Some(Compliance::InCompliance)
    } else if tape == TapeResult::Fail && is_yes(record.acft_exempt.as_ref()) {
        Some(Compliance::InCompliance)
    } else if tape == TapeResult::Fail && !exemption {
        Some(Compliance::NotInCompliance)
    } else {
        None
    };

    let tape_weight = match screening {
        Screening::NeedsTape => record.weight.clone(),
        _ => None,
    };

    Decision {
        case,
        remark,
        body_fat,
        compliance,
        tape_weight,
        stamp_preparer_initials: exemption,
    }
}

// The row value when present, else the sheet default.
fn signatory<'a>(row: &'a Option<CellValue>, default: &'a Option<CellValue>) -> Option<&'a CellValue> {
    row.as_ref().or(default.as_ref())
}

/// Writes a decision into the fields of the form.
///
/// `date` is written as given to both date fields.
pub fn render(
    record: &Record,
    decision: &Decision,
    signatories: &Signatories,
    date: &str,
) -> FieldMap {
    let mut fields = FieldMap::new();
    let mut put = |name: FieldName, value: Option<&CellValue>| {
        if let Some(v) = value {
            debug!("render: {}: '{}' -> {}", record.name, v, name);
            fields.insert(name, v.to_string());
        }
    };

    put(FieldName::Name, Some(&CellValue::Text(record.name.clone())));
    put(FieldName::Rank, record.rank.as_ref());
    put(FieldName::Age, record.age.as_ref());
    put(FieldName::Height, record.height.as_ref());
    put(FieldName::Weight, record.weight.as_ref());
    put(FieldName::First, record.readings[0].as_ref());
    put(FieldName::Second, record.readings[1].as_ref());
    put(FieldName::Third, record.readings[2].as_ref());
    put(FieldName::Average, record.average.as_ref());
    put(FieldName::Average1, record.average.as_ref());

    put(
        FieldName::PreparedBy,
        signatory(&record.prepared_by, &signatories.prepared_by),
    );
    put(
        FieldName::PrepByRank,
        signatory(&record.preparer_rank, &signatories.preparer_rank),
    );
    put(
        FieldName::ApprovedBySupervisor,
        signatory(&record.approved_by, &signatories.approved_by),
    );
    put(
        FieldName::ApprByRank,
        signatory(&record.approver_rank, &signatories.approver_rank),
    );

    if decision.stamp_preparer_initials {
        put(
            FieldName::PreparerInitials,
            signatories.preparer_initials.as_ref(),
        );
    }
    put(FieldName::Weight1, decision.tape_weight.as_ref());

    fields.insert(FieldName::Date1, date.to_string());
    fields.insert(FieldName::Date2, date.to_string());

    if let Some(bf) = decision.body_fat {
        fields.insert(FieldName::BodyFatPercentage, bf.percentage.to_string());
        fields.insert(FieldName::BodyFatStandard, bf.standard.to_string());
    }
    if let Some(remark) = &decision.remark {
        fields.insert(FieldName::Remarks, remark.text());
    }
    match decision.compliance {
        Some(Compliance::InCompliance) => {
            fields.insert(FieldName::InCompliance, "Yes".to_string());
        }
        Some(Compliance::NotInCompliance) => {
            fields.insert(FieldName::NotInCompliance, "Yes".to_string());
        }
        None => {}
    }
    fields
}

/// `<name>_<form number>.pdf`, with the characters that are not allowed in
/// file names replaced by `_`.
pub fn output_file_name(name: &str, template: FormTemplate) -> String {
    let clean: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("{}_{}.pdf", clean, template.form_number())
}

/// Selects the form and fills its fields for one record.
///
/// Fails if the gender is neither `M` nor `F`: the record must then be left out.
pub fn populate(
    record: &Record,
    signatories: &Signatories,
    date: &str,
) -> Result<FormRequest, RecordError> {
    let gender = record
        .gender
        .as_ref()
        .and_then(|g| Gender::parse(&g.to_string()));
    let template: FormTemplate = match gender {
        Some(g) => g.into(),
        None => {
            return Err(RecordError::UnknownGender {
                name: record.name.clone(),
                value: record.gender.as_ref().map(|g| g.to_string()),
            });
        }
    };
    let decision = decide(record);
    let fields = render(record, &decision, signatories, date);
    Ok(FormRequest {
        template,
        file_name: output_file_name(&record.name, template),
        fields,
    })
}
