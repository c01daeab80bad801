use clap::Parser;

/// Fills the DA Form 5500 / 5501 body fat worksheets from a height and weight roster.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The Excel roster. Soldiers are read from row 6 until the first row without a name.
    #[clap(long, value_parser)]
    pub excel: String,

    /// (file path) The fillable PDF used for male Soldiers (DA Form 5500).
    #[clap(long = "pdf_5500", value_parser)]
    pub pdf_5500: String,

    /// (file path) The fillable PDF used for female Soldiers (DA Form 5501).
    #[clap(long = "pdf_5501", value_parser)]
    pub pdf_5501: String,

    /// (directory) Where the filled forms are written. Created if it does not exist.
    #[clap(long, value_parser)]
    pub output: String,

    /// (YYYY-MM-DD, default today) The date written on the forms.
    #[clap(long, value_parser)]
    pub date: Option<String>,

    /// (default: detect from the header row) How to find the columns of the roster:
    /// 'positional' for the standard column order, or the path to a JSON layout file.
    #[clap(long, value_parser)]
    pub layout: Option<String>,

    /// (default: first worksheet) The name of the worksheet to read.
    #[clap(long, value_parser)]
    pub worksheet: Option<String>,

    /// If passed as an argument, prints the fields of every form as JSON instead of writing PDFs.
    #[clap(long, takes_value = false)]
    pub dry_run: bool,

    /// (file path) A JSON file with the fields of a previous run. The run fails if the fields differ.
    #[clap(long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on debug logging.
    #[clap(long, takes_value = false)]
    pub debug: bool,
}
