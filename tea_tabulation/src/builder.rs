pub use crate::config::*;

/// A builder for assembling a score table ballot by ballot.
///
/// ```
/// use tea_tabulation::Builder;
/// # use tea_tabulation::TabulationError;
///
/// let mut builder = Builder::new()
///     .candidates(&["Anna".to_string(), "Bob".to_string()]);
///
/// builder.add_ballot(&[5, 2])?;
/// builder.add_ballot(&[0, 4])?;
/// let table = builder.build()?;
/// assert_eq!(table.ballot_count(), 2);
///
/// # Ok::<(), TabulationError>(())
/// ```
pub struct Builder {
    _candidates: Vec<String>,
    _rows: Vec<Vec<u8>>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            _candidates: Vec::new(),
            _rows: Vec::new(),
        }
    }

    pub fn candidates(self, names: &[String]) -> Builder {
        Builder {
            _candidates: names.to_vec(),
            _rows: self._rows,
        }
    }

    /// Adds one ballot. The scores are position-aligned with the candidates.
    pub fn add_ballot(&mut self, scores: &[u8]) -> Result<(), TabulationError> {
        if scores.len() != self._candidates.len() {
            return Err(TabulationError::RaggedRow {
                row: self._rows.len() + 1,
                expected: self._candidates.len(),
                found: scores.len(),
            });
        }
        if let Some(&score) = scores.iter().find(|&&s| s > MAX_SCORE) {
            return Err(TabulationError::ScoreOutOfRange {
                row: self._rows.len() + 1,
                score,
            });
        }
        self._rows.push(scores.to_vec());
        Ok(())
    }

    pub fn build(self) -> Result<ScoreTable, TabulationError> {
        ScoreTable::new(&self._candidates, self._rows)
    }
}
