// Reading and validating TEA ballot spreadsheets.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use snafu::prelude::*;

use tea_tabulation::{ScoreTable, MAX_SCORE};

use crate::tea::{
    CsvLineParseSnafu, CsvOpenSnafu, InputNotFoundSnafu, InsufficientCandidatesSnafu,
    MalformedCellSnafu, TabulationSnafu, TeaResult,
};

lazy_static! {
    static ref GDOC_SPREADSHEET_PATTERN: Regex =
        Regex::new(r"docs\.google\.com/spreadsheets/d/(.+)/\w+").unwrap();
}

// Columns found in form exports that are not candidates: the submission
// timestamp, plus the suit/username pair used for vote verification.
const IGNORED_COLUMNS: [&str; 3] = ["suit", "timestamp", "username"];

/// A resolved ballot source.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Source {
    /// A local CSV file.
    File(String),
    /// A Google Sheets document, rewritten to its CSV export URL.
    Remote(String),
}

/// Rewrites a Google Sheets document link (`.../spreadsheets/d/<id>/edit...`)
/// into its downloadable CSV export link.
pub fn build_csv_url(url: &str) -> Option<String> {
    GDOC_SPREADSHEET_PATTERN.captures(url).map(|caps| {
        format!(
            "https://docs.google.com/spreadsheets/d/{}/export?format=csv",
            &caps[1]
        )
    })
}

/// Resolves an input string to a ballot source. Anything that is neither an
/// existing local file nor a Google Sheets link is rejected.
pub fn resolve_source(input: &str) -> TeaResult<Source> {
    if Path::new(input).exists() {
        return Ok(Source::File(input.to_string()));
    }
    match build_csv_url(input) {
        Some(url) => Ok(Source::Remote(url)),
        None => InputNotFoundSnafu {
            source_name: input.to_string(),
        }
        .fail(),
    }
}

/// Reads and validates a score table from CSV content.
///
/// The first row is the candidate header. Ignored columns are dropped before
/// validation, empty cells count as score 0, and anything that is not an
/// integer between 0 and [MAX_SCORE] fails the whole load.
pub fn read_score_table<R: Read>(reader: R) -> TeaResult<ScoreTable> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);
    let mut records = rdr.into_records();

    let header = match records.next() {
        Some(record) => record.context(CsvLineParseSnafu {})?,
        None => return InsufficientCandidatesSnafu { found: 0_usize }.fail(),
    };

    let kept: Vec<usize> = header
        .iter()
        .enumerate()
        .filter(|(_, name)| {
            let lower = name.to_lowercase();
            !IGNORED_COLUMNS.iter().any(|w| lower.contains(w))
        })
        .map(|(idx, _)| idx)
        .collect();
    let candidates: Vec<String> = kept.iter().map(|&idx| header[idx].to_string()).collect();
    debug!("read_score_table: candidate columns {:?}", candidates);
    if candidates.len() < 2 {
        return InsufficientCandidatesSnafu {
            found: candidates.len(),
        }
        .fail();
    }

    let mut rows: Vec<Vec<u8>> = Vec::new();
    for (idx, record) in records.enumerate() {
        // 1-based, counting the header as row 1
        let lineno = idx + 2;
        let line = record.context(CsvLineParseSnafu {})?;
        debug!("read_score_table: row {} {:?}", lineno, line);
        let mut scores: Vec<u8> = Vec::with_capacity(kept.len());
        for (column, &cidx) in kept.iter().enumerate() {
            let cell = line.get(cidx).unwrap_or("").trim();
            scores.push(parse_score(cell, lineno, column + 1)?);
        }
        rows.push(scores);
    }

    ScoreTable::new(&candidates, rows).context(TabulationSnafu {})
}

fn parse_score(cell: &str, row: usize, column: usize) -> TeaResult<u8> {
    if cell.is_empty() {
        return Ok(0);
    }
    match cell.parse::<i64>() {
        Ok(score) if (0..=MAX_SCORE as i64).contains(&score) => Ok(score as u8),
        _ => MalformedCellSnafu {
            value: cell.to_string(),
            row,
            column,
        }
        .fail(),
    }
}

/// Opens a local CSV file and reads its score table.
pub fn load_score_table(path: &str) -> TeaResult<ScoreTable> {
    let file = File::open(path).context(CsvOpenSnafu {
        path: path.to_string(),
    })?;
    read_score_table(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tea::TeaError;

    #[test]
    fn rewrites_google_sheet_links() {
        let url = "https://docs.google.com/spreadsheets/d/abc123XYZ/edit?gid=0#gid=0";
        assert_eq!(
            build_csv_url(url).unwrap(),
            "https://docs.google.com/spreadsheets/d/abc123XYZ/export?format=csv"
        );
    }

    #[test]
    fn other_urls_are_not_spreadsheets() {
        assert_eq!(build_csv_url("https://example.com/ballots.csv"), None);
        let res = resolve_source("https://example.com/ballots.csv");
        assert!(matches!(res, Err(TeaError::InputNotFound { .. })));
    }

    #[test]
    fn drops_ignored_columns_and_defaults_blanks() {
        let csv = "Timestamp,Alice,Bob,Suit,Username\n2024-01-01,5,,hearts,joe\n,3,2,spades,ann\n";
        let table = read_score_table(csv.as_bytes()).unwrap();
        assert_eq!(table.candidates(), &["Alice", "Bob"]);
        assert_eq!(table.rows(), &[vec![5, 0], vec![3, 2]]);
    }

    #[test]
    fn rejects_non_integer_cells() {
        let csv = "Alice,Bob\n1,foo\n";
        let res = read_score_table(csv.as_bytes());
        assert!(matches!(
            res,
            Err(TeaError::MalformedCell {
                row: 2,
                column: 2,
                ..
            })
        ));
    }

    #[test]
    fn rejects_scores_above_five() {
        let csv = "Alice,Bob\n6,0\n";
        let res = read_score_table(csv.as_bytes());
        assert!(matches!(
            res,
            Err(TeaError::MalformedCell {
                row: 2,
                column: 1,
                ..
            })
        ));
    }

    #[test]
    fn rejects_negative_scores() {
        let csv = "Alice,Bob\n0,-1\n";
        let res = read_score_table(csv.as_bytes());
        assert!(matches!(res, Err(TeaError::MalformedCell { .. })));
    }

    #[test]
    fn rejects_truncated_rows() {
        // The reader enforces a fixed record length, a row with fewer cells
        // than the header fails the whole load before any cell is parsed.
        let csv = "Alice,Bob,Carol\n1,2,3\n4,5\n";
        let res = read_score_table(csv.as_bytes());
        assert!(matches!(res, Err(TeaError::CsvLineParse { .. })));
    }

    #[test]
    fn requires_two_candidate_columns() {
        let csv = "Timestamp,Alice\n2024-01-01,5\n";
        let res = read_score_table(csv.as_bytes());
        assert!(matches!(
            res,
            Err(TeaError::InsufficientCandidates { found: 1 })
        ));
    }
}
