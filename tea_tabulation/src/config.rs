// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

/// The highest score a ballot may assign to a candidate.
pub const MAX_SCORE: u8 = 5;

/// The hard cap on the number of seats, regardless of ballot count.
pub const MAX_SEATS: u32 = 40;

/// A validated rectangular score table.
///
/// The first axis is ballots (rows), the second is candidates (columns).
/// Construction is the only validation point: the tabulation engine assumes
/// a `ScoreTable` is well-formed and never re-checks it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ScoreTable {
    candidates: Vec<String>,
    rows: Vec<Vec<u8>>,
}

impl ScoreTable {
    /// Builds a table from candidate names and ballot rows.
    ///
    /// Candidate names are sanitized to printable ASCII (emojis and control
    /// characters from spreadsheet headers are dropped). Fails if fewer than
    /// two candidates remain, if any row width differs from the header, or if
    /// any score exceeds [MAX_SCORE].
    pub fn new(candidates: &[String], rows: Vec<Vec<u8>>) -> Result<ScoreTable, TabulationError> {
        if candidates.len() < 2 {
            return Err(TabulationError::InsufficientCandidates {
                found: candidates.len(),
            });
        }
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != candidates.len() {
                return Err(TabulationError::RaggedRow {
                    row: idx + 1,
                    expected: candidates.len(),
                    found: row.len(),
                });
            }
            if let Some(&score) = row.iter().find(|&&s| s > MAX_SCORE) {
                return Err(TabulationError::ScoreOutOfRange {
                    row: idx + 1,
                    score,
                });
            }
        }
        let candidates = candidates.iter().map(|name| sanitize_name(name)).collect();
        Ok(ScoreTable { candidates, rows })
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }

    /// Number of ballots in the table.
    pub fn ballot_count(&self) -> usize {
        self.rows.len()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect()
}

// ******** Output data structures *********

/// A snapshot of the tabulation after one event.
///
/// Rounds are append-only and immutable once recorded. A round either elects
/// a candidate (`elected` is set), or carries a reweighing notice for the
/// candidates in `reweighing` ahead of the election round it precedes.
#[derive(PartialEq, Debug, Clone)]
pub struct TabulationRound {
    /// The candidate elected in this round, if any.
    pub elected: Option<String>,
    /// Candidates flagged with a weight-change notice.
    pub reweighing: Vec<String>,
    /// The candidates not yet elected after this round, in ballot-column order.
    pub unelected: Vec<String>,
    /// The approval threshold in force when this round was recorded.
    pub threshold: u8,
    /// Per-candidate weight snapshot for this round.
    pub weights: BTreeMap<String, f64>,
}

/// The completed round sequence plus the election parameters.
///
/// `rounds[0]` is the synthetic zero round (threshold 5, nobody elected),
/// kept so a display layer has an initial snapshot to render.
#[derive(PartialEq, Debug, Clone)]
pub struct TabulationResult {
    pub rounds: Vec<TabulationRound>,
    pub quota: f64,
    pub seats: u32,
}

impl TabulationResult {
    /// The elected candidates, in round order.
    pub fn elected(&self) -> Vec<String> {
        self.rounds
            .iter()
            .filter_map(|r| r.elected.clone())
            .collect()
    }

    /// The candidates still unelected after the last round.
    pub fn disqualified(&self) -> Vec<String> {
        match self.rounds.last() {
            Some(round) => round.unelected.clone(),
            None => Vec::new(),
        }
    }
}

/// Errors that prevent a tabulation from starting.
///
/// The engine itself has no recoverable failure modes: once a well-formed
/// table is accepted, tabulation runs to completion.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TabulationError {
    /// Fewer than two candidate columns.
    InsufficientCandidates { found: usize },
    /// A ballot row whose width differs from the candidate header.
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    /// A score above [MAX_SCORE].
    ScoreOutOfRange { row: usize, score: u8 },
    /// No ballots at all.
    EmptyElection,
}

impl Error for TabulationError {}

impl Display for TabulationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TabulationError::InsufficientCandidates { found } => {
                write!(f, "less than 2 candidates found ({})", found)
            }
            TabulationError::RaggedRow {
                row,
                expected,
                found,
            } => write!(
                f,
                "ballot row {} has {} scores, expected {}",
                row, found, expected
            ),
            TabulationError::ScoreOutOfRange { row, score } => {
                write!(f, "score {} outside 0-{} range (row {})", score, MAX_SCORE, row)
            }
            TabulationError::EmptyElection => write!(f, "no ballots to tabulate"),
        }
    }
}
