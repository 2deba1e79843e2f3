use clap::Parser;

/// This is a Threshold Equivalent Approval (TEA) tabulation program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path or Google Sheets URL) The spreadsheet containing the ballots. The first row
    /// holds the candidate names, every following row one ballot with integer scores 0-5.
    /// If not specified, the program prompts for it on standard input.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// Seed for the tie-break random fallback. Running twice with the same seed on the same
    /// input reproduces an identical round sequence.
    #[clap(short, long, value_parser, default_value_t = 0)]
    pub seed: u64,

    /// (file path or 'stdout') If specified, the round-by-round summary of the election will be
    /// written in JSON format to the given location.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A reference file containing the summary of an election in JSON format. If
    /// provided, teavote will check that the tabulated output matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
