use log::{info, warn};

use snafu::{prelude::*, Snafu};

use std::fs;

use serde::Serialize;
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use tea_tabulation::{run_tabulation, TabulationResult};

pub mod loader;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TeaError {
    #[snafu(display("Invalid spreadsheet file or URL: {source_name}"))]
    InputNotFound { source_name: String },
    #[snafu(display(
        "{url} is a remote spreadsheet; download the CSV export and pass the local file"
    ))]
    RemoteNotSupported { url: String },
    #[snafu(display(
        "Malformed cell {value:?} (row {row}, column {column}): expected an empty cell or an integer between 0 and 5"
    ))]
    MalformedCell {
        value: String,
        row: usize,
        column: usize,
    },
    #[snafu(display("Less than 2 candidate columns found ({found})"))]
    InsufficientCandidates { found: usize },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing CSV input"))]
    CsvLineParse { source: csv::Error },
    #[snafu(display("Tabulation failed"))]
    Tabulation {
        source: tea_tabulation::TabulationError,
    },
    #[snafu(display("Error opening JSON file"))]
    OpeningJson { source: std::io::Error },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing summary to {path}"))]
    WritingSummary {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Summary differs from the reference summary"))]
    ReferenceMismatch {},
}

pub type TeaResult<T> = Result<T, TeaError>;

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
struct SummaryConfig {
    quota: String,
    seats: u32,
    seed: u64,
}

/// Renders the round sequence in JSON form. Weights are formatted to 4
/// decimal places, the way a display layer renders them, so two summaries of
/// the same election compare byte for byte.
fn result_to_json(result: &TabulationResult, seed: u64) -> JSValue {
    let mut rounds_js: Vec<JSValue> = Vec::new();
    for (idx, round) in result.rounds.iter().enumerate() {
        let mut weights: JSMap<String, JSValue> = JSMap::new();
        for (name, w) in round.weights.iter() {
            weights.insert(name.clone(), json!(format!("{:.4}", w)));
        }
        rounds_js.push(json!({
            "round": idx,
            "threshold": round.threshold,
            "elected": round.elected,
            "reweighing": round.reweighing,
            "unelected": round.unelected,
            "weights": weights,
        }));
    }
    let config = SummaryConfig {
        quota: format!("{:.6}", result.quota),
        seats: result.seats,
        seed,
    };
    json!({ "config": config, "rounds": rounds_js })
}

/// Loads the ballots, runs the tabulation and prints the outcome.
///
/// The validation pass in the loader runs before any tabulation starts; the
/// engine never re-checks its input.
pub fn run_election(
    source: &str,
    seed: u64,
    out_path: Option<String>,
    reference_path: Option<String>,
) -> TeaResult<()> {
    let table = match loader::resolve_source(source)? {
        loader::Source::File(path) => loader::load_score_table(&path)?,
        loader::Source::Remote(url) => {
            return RemoteNotSupportedSnafu { url }.fail();
        }
    };
    info!(
        "run_election: {} ballots over candidates {:?}",
        table.ballot_count(),
        table.candidates()
    );

    let result = run_tabulation(&table, seed).context(TabulationSnafu {})?;

    println!("Quota = {:.6}, seats = {}", result.quota, result.seats);
    println!("===== Elected =====");
    for name in result.elected() {
        println!("- {}", name);
    }
    println!("=== Disqualified ===");
    for name in result.disqualified() {
        println!("- {}", name);
    }

    let summary = result_to_json(&result, seed);
    let pretty_js_stats = serde_json::to_string_pretty(&summary).context(ParsingJsonSnafu {})?;

    if let Some(path) = out_path {
        if path == "stdout" {
            println!("{}", pretty_js_stats);
        } else {
            fs::write(&path, &pretty_js_stats)
                .context(WritingSummarySnafu { path: path.clone() })?;
            info!("run_election: summary written to {}", path);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(path) = reference_path {
        let contents = fs::read_to_string(&path).context(OpeningJsonSnafu {})?;
        let reference: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
        if pretty_js_reference != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(pretty_js_reference.as_str(), pretty_js_stats.as_str(), "\n");
            return ReferenceMismatchSnafu {}.fail();
        }
    }

    Ok(())
}
