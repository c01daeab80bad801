pub use crate::config::*;

/// A builder for records.
///
/// Blank text values are stored as missing cells, like a blank cell in the roster.
///
/// ```
/// use abcp_compliance::builder::RecordBuilder;
/// use abcp_compliance::{populate, FieldName, FormTemplate, Signatories};
/// # use abcp_compliance::RecordError;
///
/// let record = RecordBuilder::new("Doe")
///     .gender("M")
///     .weight(180)
///     .max_weight(200)
///     .screening("Pass")
///     .build();
///
/// let request = populate(&record, &Signatories::default(), "20240501")?;
/// assert_eq!(request.template, FormTemplate::Male5500);
/// assert_eq!(request.file_name, "Doe_5500.pdf");
/// assert_eq!(request.fields.get(&FieldName::InCompliance).map(|s| s.as_str()), Some("Yes"));
///
/// # Ok::<(), RecordError>(())
/// ```
pub struct RecordBuilder {
    pub(crate) _record: Record,
}

fn cell(v: impl Into<CellValue>) -> Option<CellValue> {
    v.into().non_blank()
}

impl RecordBuilder {
    pub fn new(name: &str) -> RecordBuilder {
        RecordBuilder {
            _record: Record {
                name: name.to_string(),
                ..Record::default()
            },
        }
    }

    pub fn rank(mut self, v: impl Into<CellValue>) -> RecordBuilder {
        self._record.rank = cell(v);
        self
    }

    pub fn gender(mut self, v: impl Into<CellValue>) -> RecordBuilder {
        self._record.gender = cell(v);
        self
    }

    pub fn age(mut self, v: impl Into<CellValue>) -> RecordBuilder {
        self._record.age = cell(v);
        self
    }

    pub fn height(mut self, v: impl Into<CellValue>) -> RecordBuilder {
        self._record.height = cell(v);
        self
    }

    pub fn weight(mut self, v: impl Into<CellValue>) -> RecordBuilder {
        self._record.weight = cell(v);
        self
    }

    pub fn acft_exempt(mut self, v: impl Into<CellValue>) -> RecordBuilder {
        self._record.acft_exempt = cell(v);
        self
    }

    pub fn max_weight(mut self, v: impl Into<CellValue>) -> RecordBuilder {
        self._record.max_weight = cell(v);
        self
    }

    pub fn screening(mut self, v: impl Into<CellValue>) -> RecordBuilder {
        self._record.screening = cell(v);
        self
    }

    /// Sets the three circumference readings and their average.
    pub fn readings(
        mut self,
        first: impl Into<CellValue>,
        second: impl Into<CellValue>,
        third: impl Into<CellValue>,
        average: impl Into<CellValue>,
    ) -> RecordBuilder {
        self._record.readings = [cell(first), cell(second), cell(third)];
        self._record.average = cell(average);
        self
    }

    pub fn body_fat(
        mut self,
        percentage: impl Into<CellValue>,
        standard: impl Into<CellValue>,
    ) -> RecordBuilder {
        self._record.body_fat_percentage = cell(percentage);
        self._record.body_fat_standard = cell(standard);
        self
    }

    pub fn tape_result(mut self, v: impl Into<CellValue>) -> RecordBuilder {
        self._record.tape_result = cell(v);
        self
    }

    /// Row-level preparer, overriding the defaults of the sheet.
    pub fn preparer(
        mut self,
        name: impl Into<CellValue>,
        rank: impl Into<CellValue>,
    ) -> RecordBuilder {
        self._record.prepared_by = cell(name);
        self._record.preparer_rank = cell(rank);
        self
    }

    /// Row-level approver, overriding the defaults of the sheet.
    pub fn approver(
        mut self,
        name: impl Into<CellValue>,
        rank: impl Into<CellValue>,
    ) -> RecordBuilder {
        self._record.approved_by = cell(name);
        self._record.approver_rank = cell(rank);
        self
    }

    pub fn build(self) -> Record {
        self._record
    }
}
