use log::{debug, info, warn};

use abcp_compliance::*;
use snafu::{prelude::*, Snafu};

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use text_diff::print_diff;

use crate::args::Args;
use crate::forms::config_reader::{form_date, ColumnLayout, LayoutChoice};
use crate::forms::io_common::forms_to_json;
use crate::forms::io_excel::{get_range, read_header, read_record, read_signatories};
use crate::forms::io_pdf::LopdfFiller;

pub mod config_reader;
pub mod io_common;
pub mod io_excel;
pub mod io_pdf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FormsError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The workbook {path} has no worksheet"))]
    EmptyExcel { path: String },
    #[snafu(display("The workbook {path} has no worksheet named '{name}'"))]
    MissingWorksheet { path: String, name: String },
    #[snafu(display("Row {row}, column {column}: could not read cell {content}"))]
    ExcelWrongCellType {
        row: u32,
        column: String,
        content: String,
    },
    #[snafu(display(
        "Columns not found in header row {row}: {missing}. Use --layout positional or a layout file"
    ))]
    HeaderMismatch { row: u32, missing: String },
    #[snafu(display("Error opening layout file {path}"))]
    OpeningLayout {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing layout file {path}"))]
    ParsingLayout {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Invalid column in layout file: {key}: {value}"))]
    InvalidColumn { key: String, value: String },
    #[snafu(display("Invalid date '{value}', use YYYY-MM-DD"))]
    InvalidDate {
        source: chrono::ParseError,
        value: String,
    },
    #[snafu(display("Template {path} does not exist"))]
    MissingTemplate { path: String },
    #[snafu(display("Error reading PDF {path}"))]
    OpeningPdf { source: lopdf::Error, path: String },
    #[snafu(display("The PDF {path} has no fillable form"))]
    NoForm { path: String },
    #[snafu(display("Error writing PDF {path}: {message}"))]
    WritingPdf { path: String, message: String },
    #[snafu(display("Error creating output directory {path}"))]
    CreatingOutputDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening reference file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Row {row}: {source}"))]
    SkippedRecord { source: RecordError, row: u32 },
    #[snafu(display("Interrupted, stopped before row {row}"))]
    Interrupted { row: u32 },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type FormsResult<T> = Result<T, FormsError>;

/// Writes filled copies of a fillable PDF.
pub trait FormFiller {
    /// The names the fields of the template can be filled by: the fully
    /// qualified names, and the terminal names of nested fields.
    fn field_names(&self, template: &Path) -> FormsResult<BTreeSet<String>>;

    /// Writes a copy of the template with the given values to `output`.
    /// A fully qualified name takes precedence over a terminal name. Names
    /// that are not fields of the template are ignored.
    fn fill(
        &self,
        template: &Path,
        output: &Path,
        values: &BTreeMap<String, String>,
    ) -> FormsResult<()>;
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Templates {
    pub male: PathBuf,
    pub female: PathBuf,
}

impl Templates {
    pub fn path(&self, t: FormTemplate) -> &Path {
        match t {
            FormTemplate::Male5500 => &self.male,
            FormTemplate::Female5501 => &self.female,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub excel: String,
    pub worksheet: Option<String>,
    pub templates: Templates,
    pub output_dir: PathBuf,
    /// YYYYMMDD
    pub date: String,
    pub layout: LayoutChoice,
    pub dry_run: bool,
    pub reference: Option<String>,
}

impl RunSettings {
    pub fn from_args(args: &Args) -> FormsResult<RunSettings> {
        Ok(RunSettings {
            excel: args.excel.clone(),
            worksheet: args.worksheet.clone(),
            templates: Templates {
                male: PathBuf::from(&args.pdf_5500),
                female: PathBuf::from(&args.pdf_5501),
            },
            output_dir: PathBuf::from(&args.output),
            date: form_date(args.date.as_deref())?,
            layout: LayoutChoice::from_arg(args.layout.as_deref()),
            dry_run: args.dry_run,
            reference: args.reference.clone(),
        })
    }
}

#[derive(PartialEq, Debug, Clone, Default)]
pub struct RunReport {
    /// Forms generated (or rendered, in a dry run).
    pub processed: u64,
    /// Records left out, and forms that could not be written.
    pub errors: u64,
    /// The 1-based row and the form of every valid record, in roster order.
    pub forms: Vec<(u32, FormRequest)>,
}

fn check_templates(templates: &Templates) -> FormsResult<()> {
    for p in [&templates.male, &templates.female] {
        ensure!(
            p.is_file(),
            MissingTemplateSnafu {
                path: p.display().to_string()
            }
        );
    }
    Ok(())
}

fn resolve_layout(
    choice: &LayoutChoice,
    range: &calamine::Range<calamine::DataType>,
) -> FormsResult<ColumnLayout> {
    let layout = match choice {
        LayoutChoice::Detect => {
            let header = read_header(range, config_reader::HEADER_ROW);
            ColumnLayout::detect(&header)?
        }
        LayoutChoice::Positional => ColumnLayout::positional(),
        LayoutChoice::File(path) => ColumnLayout::from_file(path)?,
    };
    debug!("resolve_layout: {:?}", layout);
    Ok(layout)
}

// Keeps the values that the template can receive.
fn template_values(
    request: &FormRequest,
    known: &BTreeSet<String>,
) -> BTreeMap<String, String> {
    let mut res: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in request.fields.iter() {
        if known.contains(name.as_str()) {
            res.insert(name.to_string(), value.clone());
        } else {
            debug!(
                "{}: form {} has no field '{}', dropping it",
                request.file_name,
                request.template.form_number(),
                name
            );
        }
    }
    res
}

/// Reads the roster and writes one form per Soldier.
///
/// Problems with the inputs stop the run before any form is written. Problems
/// with a single record are logged and counted, and the run continues.
/// Once `stop` is set, no further record is started.
pub fn run<F: FormFiller>(
    settings: &RunSettings,
    filler: &F,
    stop: &AtomicBool,
) -> FormsResult<RunReport> {
    check_templates(&settings.templates)?;

    let range = get_range(&settings.excel, settings.worksheet.as_deref())?;
    let layout = resolve_layout(&settings.layout, &range)?;
    let signatories = read_signatories(&range);

    let mut known_fields: BTreeMap<FormTemplate, BTreeSet<String>> = BTreeMap::new();
    if !settings.dry_run {
        for t in [FormTemplate::Male5500, FormTemplate::Female5501] {
            let names = filler.field_names(settings.templates.path(t))?;
            debug!("run: form {} fields: {:?}", t.form_number(), names);
            if !FieldName::ALL.iter().any(|f| names.contains(f.as_str())) {
                warn!(
                    "None of the expected fields were found in form {} ({}), its forms will be left out",
                    t.form_number(),
                    settings.templates.path(t).display()
                );
            }
            known_fields.insert(t, names);
        }
        fs::create_dir_all(&settings.output_dir).context(CreatingOutputDirSnafu {
            path: settings.output_dir.display().to_string(),
        })?;
    }

    info!(
        "Starting PDF generation from row {}...",
        layout.first_data_row
    );
    let mut report = RunReport::default();
    let mut row = layout.first_data_row;
    loop {
        ensure!(!stop.load(Ordering::SeqCst), InterruptedSnafu { row });
        let record = match read_record(&range, &layout, row) {
            Ok(Some(r)) => r,
            Ok(None) => {
                info!("Stopping at row {} as the name is empty.", row);
                break;
            }
            Err(e) => {
                warn!("Skipping row {}: {}", row, e);
                report.errors += 1;
                row += 1;
                continue;
            }
        };

        match populate(&record, &signatories, &settings.date).context(SkippedRecordSnafu { row }) {
            Ok(request) if settings.dry_run => {
                report.processed += 1;
                report.forms.push((row, request));
            }
            Ok(request) => {
                let output = settings.output_dir.join(&request.file_name);
                let empty = BTreeSet::new();
                let known = known_fields.get(&request.template).unwrap_or(&empty);
                let values = template_values(&request, known);
                if values.is_empty() {
                    warn!(
                        "Row {}: {}: no field of form {} can be filled. Skipping.",
                        row,
                        record.name,
                        request.template.form_number()
                    );
                    report.errors += 1;
                    row += 1;
                    continue;
                }
                match filler.fill(settings.templates.path(request.template), &output, &values) {
                    Ok(()) => {
                        info!("Generated: {}", output.display());
                        report.processed += 1;
                        report.forms.push((row, request));
                    }
                    Err(e) => {
                        warn!("Row {}: {}: {}", row, record.name, e);
                        report.errors += 1;
                    }
                }
            }
            Err(e) => {
                warn!("{}. Skipping.", e);
                report.errors += 1;
            }
        }
        row += 1;
    }

    let forms_js = forms_to_json(&report.forms);
    let pretty_js_forms = serde_json::to_string_pretty(&forms_js).context(ParsingJsonSnafu {})?;
    if settings.dry_run {
        println!("{}", pretty_js_forms);
    }

    // The reference fields, if provided for comparison
    if let Some(reference_p) = &settings.reference {
        let contents =
            fs::read_to_string(reference_p).context(OpeningJsonSnafu { path: reference_p })?;
        let reference_js: serde_json::Value =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference_js).context(ParsingJsonSnafu {})?;
        if pretty_js_reference != pretty_js_forms {
            warn!("Found differences with the reference fields");
            print_diff(pretty_js_reference.as_str(), pretty_js_forms.as_str(), "\n");
            whatever!("Difference detected between the generated fields and the reference fields")
        }
    }

    Ok(report)
}

pub fn run_forms(args: &Args) -> FormsResult<RunReport> {
    let settings = RunSettings::from_args(args)?;
    info!("settings: {:?}", settings);
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .whatever_context("Could not install the interrupt handler")?;
    run(&settings, &LopdfFiller, &stop)
}


#[cfg(test)]
mod tests {
    use super::test_util::*;
    use super::*;
    use std::cell::RefCell;

    /// Records the calls instead of writing PDFs.
    struct RecordingFiller {
        calls: RefCell<Vec<(PathBuf, PathBuf, BTreeMap<String, String>)>>,
        fail_on: Option<String>,
        // Set after each successful fill.
        interrupt: Option<Arc<AtomicBool>>,
    }

    impl RecordingFiller {
        fn new() -> RecordingFiller {
            RecordingFiller {
                calls: RefCell::new(Vec::new()),
                fail_on: None,
                interrupt: None,
            }
        }
    }

    impl FormFiller for RecordingFiller {
        fn field_names(&self, _template: &Path) -> FormsResult<BTreeSet<String>> {
            // The male form has no initials box.
            Ok(FieldName::ALL
                .iter()
                .filter(|f| **f != FieldName::PreparerInitials)
                .map(|f| f.to_string())
                .collect())
        }

        fn fill(
            &self,
            template: &Path,
            output: &Path,
            values: &BTreeMap<String, String>,
        ) -> FormsResult<()> {
            if let Some(name) = &self.fail_on {
                if output.ends_with(name) {
                    whatever!("cannot write {}", output.display())
                }
            }
            self.calls.borrow_mut().push((
                template.to_path_buf(),
                output.to_path_buf(),
                values.clone(),
            ));
            if let Some(flag) = &self.interrupt {
                flag.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn run_all<F: FormFiller>(settings: &RunSettings, filler: &F) -> FormsResult<RunReport> {
        run(settings, filler, &AtomicBool::new(false))
    }

    struct Fixture {
        dir: tempfile::TempDir,
        settings: RunSettings,
    }

    fn fixture(rows: &[&[&str]]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let excel = dir.path().join("roster.xlsx");
        write_roster(&excel, rows);
        let male = dir.path().join("male.pdf");
        let female = dir.path().join("female.pdf");
        fs::write(&male, b"%PDF-1.5").unwrap();
        fs::write(&female, b"%PDF-1.5").unwrap();
        let settings = RunSettings {
            excel: excel.display().to_string(),
            worksheet: None,
            templates: Templates { male, female },
            output_dir: dir.path().join("out"),
            date: "20240501".to_string(),
            layout: LayoutChoice::Detect,
            dry_run: false,
            reference: None,
        };
        Fixture { dir, settings }
    }

    const ROWS: [&[&str]; 6] = [
        &["Doe", "SGT", "M", "27", "70", "180", "", "200", "Pass"],
        &[
            "Roe", "SPC", " f ", "22", "64", "150", "No", "141", "Needs Tape", "30", "30.5", "30",
            "30.17", "0.33", "", "0.32", "Fail Tape",
        ],
        &["Poe", "PFC", "X", "19"],
        &[
            "Loe", "SSG", "M", "35", "72", "210", "Yes", "199", "Needs Tape", "", "", "", "", "0.24",
            "", "0.22", "", "BROWN, AL", "SFC",
        ],
        &[],
        &["Late", "SGT", "M", "27", "70", "180", "", "200", "Pass"],
    ];

    #[test]
    fn fills_every_valid_record() {
        let f = fixture(&ROWS);
        let filler = RecordingFiller::new();
        let report = run_all(&f.settings, &filler).unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.errors, 1);

        let calls = filler.calls.borrow();
        assert_eq!(calls.len(), 3);
        let outputs: Vec<PathBuf> = calls.iter().map(|(_, o, _)| o.clone()).collect();
        let out = f.dir.path().join("out");
        assert_eq!(
            outputs,
            vec![
                out.join("Doe_5500.pdf"),
                out.join("Roe_5501.pdf"),
                out.join("Loe_5500.pdf")
            ]
        );
        assert!(out.is_dir());

        let (template, _, doe) = &calls[0];
        assert_eq!(template, &f.settings.templates.male);
        assert_eq!(doe["IN COMPLIANCE"], "Yes");
        assert_eq!(doe["DATE1"], "20240501");
        assert_eq!(doe["PREPARED BY"], "SMITH, JOHN");
        assert!(doe["REMARKS"].contains("180 pounds"));
        assert!(!doe.contains_key("BODY FAT PERCENTAGE"));

        let (template, _, roe) = &calls[1];
        assert_eq!(template, &f.settings.templates.female);
        assert_eq!(roe["BODY FAT PERCENTAGE"], "33");
        assert_eq!(roe["BODY FAT STANDARD"], "32");
        assert_eq!(roe["NOT IN COMPLIANCE"], "Yes");
        assert_eq!(roe["WEIGHT_1"], "150");
        assert_eq!(roe["AVERAGE"], "30.17");
        assert_eq!(roe["AVERAGE_1"], "30.17");

        let (_, _, loe) = &calls[2];
        assert_eq!(
            loe["REMARKS"],
            abcp_compliance::remarks::ACFT_FAIL_HEIGHT_WEIGHT_PASS
        );
        assert_eq!(loe["PREPARED BY"], "BROWN, AL");
        assert_eq!(loe["PREP_BY_RANK"], "SFC");
        assert_eq!(loe["APPROVED BY SUPERVISOR"], "JONES, MARY");
        // Not a field of the template.
        assert!(!loe.contains_key("Preparer's Initials"));
        // The rendered form keeps it.
        assert_eq!(
            report.forms[2].1.fields.get(&FieldName::PreparerInitials),
            Some(&"JS".to_string())
        );
        assert_eq!(report.forms[2].0, 9);
    }

    #[test]
    fn failed_writes_are_counted() {
        let f = fixture(&ROWS);
        let mut filler = RecordingFiller::new();
        filler.fail_on = Some("Roe_5501.pdf".to_string());
        let report = run_all(&f.settings, &filler).unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.errors, 2);
        assert_eq!(filler.calls.borrow().len(), 2);
    }

    #[test]
    fn missing_template_is_fatal() {
        let mut f = fixture(&ROWS);
        f.settings.templates.female = f.dir.path().join("nope.pdf");
        let filler = RecordingFiller::new();
        assert!(matches!(
            run_all(&f.settings, &filler),
            Err(FormsError::MissingTemplate { .. })
        ));
        assert!(filler.calls.borrow().is_empty());
        assert!(!f.dir.path().join("out").exists());
    }

    #[test]
    fn missing_workbook_is_fatal() {
        let mut f = fixture(&ROWS);
        f.settings.excel = f.dir.path().join("nope.xlsx").display().to_string();
        assert!(matches!(
            run_all(&f.settings, &RecordingFiller::new()),
            Err(FormsError::OpeningExcel { .. })
        ));
    }

    #[test]
    fn unknown_header_is_fatal_unless_positional() {
        let mut f = fixture(&[]);
        let mut header = HEADER;
        header[16] = "Result";
        write_roster_with_header(Path::new(&f.settings.excel), &header, &ROWS);
        let filler = RecordingFiller::new();
        assert!(matches!(
            run_all(&f.settings, &filler),
            Err(FormsError::HeaderMismatch { .. })
        ));
        assert!(filler.calls.borrow().is_empty());

        f.settings.layout = LayoutChoice::Positional;
        let report = run_all(&f.settings, &filler).unwrap();
        assert_eq!(report.processed, 3);
    }

    #[test]
    fn layout_file() {
        let mut f = fixture(&[]);
        // The tape result moved to the last column.
        let rows: Vec<Vec<&str>> = ROWS
            .iter()
            .map(|r| {
                let mut r: Vec<&str> = r.to_vec();
                r.resize(22, "");
                r.swap(16, 21);
                r
            })
            .collect();
        let rows: Vec<&[&str]> = rows.iter().map(|r| r.as_slice()).collect();
        write_roster_with_header(Path::new(&f.settings.excel), &[], &rows);
        let layout_p = f.dir.path().join("layout.json");
        fs::write(&layout_p, r#"{"columns": {"tapeResult": "V"}}"#).unwrap();
        f.settings.layout = LayoutChoice::File(layout_p.display().to_string());

        let filler = RecordingFiller::new();
        let report = run_all(&f.settings, &filler).unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(filler.calls.borrow()[1].2["NOT IN COMPLIANCE"], "Yes");
    }

    #[test]
    fn dry_run_writes_nothing() {
        let mut f = fixture(&ROWS);
        f.settings.dry_run = true;
        let filler = RecordingFiller::new();
        let report = run_all(&f.settings, &filler).unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.errors, 1);
        assert!(filler.calls.borrow().is_empty());
        assert!(!f.dir.path().join("out").exists());
    }

    #[test]
    fn reference_check() {
        let mut f = fixture(&ROWS);
        f.settings.dry_run = true;
        let report = run_all(&f.settings, &RecordingFiller::new()).unwrap();
        let reference_p = f.dir.path().join("reference.json");
        fs::write(
            &reference_p,
            serde_json::to_string(&forms_to_json(&report.forms)).unwrap(),
        )
        .unwrap();
        f.settings.reference = Some(reference_p.display().to_string());
        // Same inputs, same date: same fields.
        let again = run_all(&f.settings, &RecordingFiller::new()).unwrap();
        assert_eq!(again, report);

        f.settings.date = "20240502".to_string();
        assert!(matches!(
            run_all(&f.settings, &RecordingFiller::new()),
            Err(FormsError::Whatever { .. })
        ));
    }

    #[test]
    fn fills_real_pdfs() {
        let f = fixture(&ROWS);
        let names: Vec<&str> = FieldName::ALL.iter().map(|n| n.as_str()).collect();
        io_pdf::tests::make_form_pdf(&f.settings.templates.male, &names);
        io_pdf::tests::make_form_pdf(&f.settings.templates.female, &names);
        let report = run_all(&f.settings, &LopdfFiller).unwrap();
        assert_eq!(report.processed, 3);
        assert_eq!(report.errors, 1);
        let out = f.dir.path().join("out");
        for name in ["Doe_5500.pdf", "Roe_5501.pdf", "Loe_5500.pdf"] {
            assert!(out.join(name).is_file(), "{}", name);
        }
        assert!(!out.join("Poe_5500.pdf").exists());
        assert!(!out.join("Late_5500.pdf").exists());
        let doe = LopdfFiller.field_names(&out.join("Doe_5500.pdf")).unwrap();
        assert!(doe.contains("REMARKS"));
    }

    #[test]
    fn interrupt_stops_before_the_next_record() {
        let f = fixture(&ROWS);
        let stop = Arc::new(AtomicBool::new(false));
        let mut filler = RecordingFiller::new();
        filler.interrupt = Some(stop.clone());
        assert!(matches!(
            run(&f.settings, &filler, &stop),
            Err(FormsError::Interrupted { row: 7 })
        ));
        assert_eq!(filler.calls.borrow().len(), 1);
    }

    #[test]
    fn fills_nested_pdf_fields() {
        let f = fixture(&ROWS);
        let names: Vec<String> = FieldName::ALL
            .iter()
            .map(|n| format!("form1.{}", n))
            .collect();
        let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        io_pdf::tests::make_form_pdf(&f.settings.templates.male, &names);
        io_pdf::tests::make_form_pdf(&f.settings.templates.female, &names);
        let report = run_all(&f.settings, &LopdfFiller).unwrap();
        assert_eq!(report.processed, 3);
        let doe = f.dir.path().join("out").join("Doe_5500.pdf");
        assert_eq!(
            io_pdf::tests::text_of(&doe, "form1.NAME").as_deref(),
            Some("Doe")
        );
        assert_eq!(
            io_pdf::tests::text_of(&doe, "form1.DATE1").as_deref(),
            Some("20240501")
        );
        assert_eq!(
            io_pdf::tests::text_of(&doe, "form1.IN COMPLIANCE").as_deref(),
            Some("On")
        );
    }

    #[test]
    fn forms_without_known_fields_are_errors() {
        let f = fixture(&ROWS);
        io_pdf::tests::make_form_pdf(&f.settings.templates.male, &["form1.Text1"]);
        io_pdf::tests::make_form_pdf(&f.settings.templates.female, &["form1.Text1"]);
        let report = run_all(&f.settings, &LopdfFiller).unwrap();
        assert_eq!(report.processed, 0);
        assert_eq!(report.errors, 4);
        assert!(!f.dir.path().join("out").join("Doe_5500.pdf").exists());
    }
}
