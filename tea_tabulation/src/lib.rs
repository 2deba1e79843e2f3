mod builder;
mod config;

use log::{debug, info};

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

pub use crate::builder::Builder;
pub use crate::config::*;

/// Absolute tolerance of the transfer-value search.
const EPSILON: f64 = 1e-6;

// **** Private structures ****

// A ballot in the central arena. The weight starts at 1.0 and only ever
// decreases, down to 0.0. Candidates refer to ballots by arena index, so a
// weight deduction is visible to every candidate sharing the ballot.
#[derive(PartialEq, Debug, Clone)]
struct Ballot {
    weight: f64,
    scores: Vec<u8>,
}

// A candidate with its view of the ballot arena: one (arena index, score)
// pair per ballot, in ballot order.
#[derive(PartialEq, Debug, Clone)]
struct CandidateState {
    name: String,
    ballots: Vec<(usize, u8)>,
}

// The ballot filter in force during a phase: the main loop counts scores at
// or above the current threshold, the runoff counts any positive score.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum BallotFilter {
    AtLeast(u8),
    Positive,
}

impl BallotFilter {
    fn accepts(self, score: u8) -> bool {
        match self {
            BallotFilter::AtLeast(threshold) => score >= threshold,
            BallotFilter::Positive => score > 0,
        }
    }
}

// **** Numeric routines ****

/// Computes the number of seats from the ballot count:
/// `min(floor(3.5 + ballots / 11), 40)`.
pub fn compute_seats(ballot_count: usize) -> u32 {
    let seats = (3.5 + ballot_count as f64 / 11.0).floor() as u32;
    seats.min(MAX_SEATS)
}

/// The minimum weighted support required for election.
pub fn compute_quota(ballot_count: usize, seats: u32) -> f64 {
    ballot_count as f64 / seats as f64
}

/// Finds, by binary search over `[0, quota]`, the value `n` such that the sum
/// of `min(n, w)` over the given ballot weights equals one quota.
///
/// Precondition: the weights sum to at least `quota`, which makes the search
/// well-formed (the sum is continuous and non-decreasing in `n`).
pub fn transfer_value(weights: &[f64], quota: f64, epsilon: f64) -> f64 {
    let mut low = 0.0_f64;
    let mut high = quota;
    while (high - low) >= epsilon {
        let n = (high + low) / 2.0;
        let wsum: f64 = weights.iter().map(|&w| w.min(n)).sum();
        if wsum < quota {
            low = n;
        } else {
            high = n;
        }
    }
    (high + low) / 2.0
}

// **** Candidate tallies ****

fn filtered_weight(candidate: &CandidateState, arena: &[Ballot], filter: BallotFilter) -> f64 {
    candidate
        .ballots
        .iter()
        .filter(|&&(_, s)| filter.accepts(s))
        .map(|&(b, _)| arena[b].weight)
        .sum()
}

fn filtered_weights(candidate: &CandidateState, arena: &[Ballot], filter: BallotFilter) -> Vec<f64> {
    candidate
        .ballots
        .iter()
        .filter(|&&(_, s)| filter.accepts(s))
        .map(|&(b, _)| arena[b].weight)
        .collect()
}

fn weighted_score_sum(candidate: &CandidateState, arena: &[Ballot]) -> f64 {
    candidate
        .ballots
        .iter()
        .map(|&(b, s)| arena[b].weight * s as f64)
        .sum()
}

fn raw_score_sum(candidate: &CandidateState) -> u64 {
    candidate.ballots.iter().map(|&(_, s)| s as u64).sum()
}

// **** Tie-break cascade ****

// Keeps the members of `set` attaining the maximum of `key`. Sums are
// compared for exact equality: both sides are computed the same way from the
// same weights, so identical support yields identical bits.
fn narrow_to_max<F: Fn(usize) -> f64>(set: &[usize], key: F) -> Vec<usize> {
    let scored: Vec<(usize, f64)> = set.iter().map(|&ci| (ci, key(ci))).collect();
    let best = scored
        .iter()
        .map(|&(_, v)| v)
        .fold(f64::NEG_INFINITY, |a, b| a.max(b));
    scored
        .iter()
        .filter(|&&(_, v)| v == best)
        .map(|&(ci, _)| ci)
        .collect()
}

// Resolves a tie between two or more candidates. A fallback is drawn
// uniformly from the full tied set up front; then three criteria narrow the
// set in fixed order. The first criterion that narrows to a single candidate
// decides. If all three run without reaching a single candidate, the random
// fallback is returned.
fn break_tie<R: Rng>(
    tied: &[usize],
    candidates: &[CandidateState],
    arena: &[Ballot],
    filter: BallotFilter,
    rng: &mut R,
) -> usize {
    debug_assert!(tied.len() > 1);
    let fallback = tied[rng.gen_range(0..tied.len())];

    // 1. Largest total ballot weight under the phase filter.
    let current = narrow_to_max(tied, |ci| filtered_weight(&candidates[ci], arena, filter));
    if current.len() == 1 {
        return current[0];
    }
    // 2. Largest sum of weight * score over all ballots.
    let current = narrow_to_max(&current, |ci| weighted_score_sum(&candidates[ci], arena));
    if current.len() == 1 {
        return current[0];
    }
    // 3. Largest sum of raw scores over all ballots.
    let current = narrow_to_max(&current, |ci| raw_score_sum(&candidates[ci]) as f64);
    if current.len() == 1 {
        return current[0];
    }
    debug!(
        "break_tie: cascade did not narrow {:?}, falling back to random pick {:?}",
        tied, fallback
    );
    fallback
}

// **** Round bookkeeping ****

fn snapshot_at_threshold(
    candidates: &[CandidateState],
    arena: &[Ballot],
    threshold: u8,
) -> BTreeMap<String, f64> {
    candidates
        .iter()
        .map(|c| {
            (
                c.name.clone(),
                filtered_weight(c, arena, BallotFilter::AtLeast(threshold)),
            )
        })
        .collect()
}

fn unelected_names(candidates: &[CandidateState], is_elected: &[bool]) -> Vec<String> {
    candidates
        .iter()
        .enumerate()
        .filter(|&(ci, _)| !is_elected[ci])
        .map(|(_, c)| c.name.clone())
        .collect()
}

// The notice rule of the original tabulator, preserved as observed: the
// just-elected candidate is flagged (once) whenever a ballot that counted
// toward it has any other candidate column, whatever that column's score.
// The other candidates actually sharing the ballot weight are never flagged.
fn reweighing_notice(winner: usize, counted: &[usize], arena: &[Ballot]) -> Vec<usize> {
    let mut notice: Vec<usize> = Vec::new();
    for &b in counted {
        for ind in 0..arena[b].scores.len() {
            if ind != winner && notice.is_empty() {
                notice.push(winner);
            }
        }
    }
    notice
}

// **** Engine ****

/// Runs the full TEA tabulation with a seeded tie-break source.
///
/// A fixed seed reproduces an identical round sequence for identical input.
pub fn run_tabulation(table: &ScoreTable, seed: u64) -> Result<TabulationResult, TabulationError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    run_tabulation_with_rng(table, &mut rng)
}

/// Runs the full TEA tabulation with the given tie-break random source.
///
/// The run is single-threaded and synchronous: it mutates ballot weights in
/// place and returns only when the round sequence is complete.
pub fn run_tabulation_with_rng<R: Rng>(
    table: &ScoreTable,
    rng: &mut R,
) -> Result<TabulationResult, TabulationError> {
    if table.ballot_count() == 0 {
        return Err(TabulationError::EmptyElection);
    }

    let mut arena: Vec<Ballot> = table
        .rows()
        .iter()
        .map(|row| Ballot {
            weight: 1.0,
            scores: row.clone(),
        })
        .collect();

    let candidates: Vec<CandidateState> = table
        .candidates()
        .iter()
        .enumerate()
        .map(|(ci, name)| CandidateState {
            name: name.clone(),
            ballots: arena
                .iter()
                .enumerate()
                .map(|(b, ballot)| (b, ballot.scores[ci]))
                .collect(),
        })
        .collect();

    let seats = compute_seats(table.ballot_count());
    let quota = compute_quota(table.ballot_count(), seats);
    info!(
        "run_tabulation: {} ballots, {} candidates, {} seats, quota {}",
        table.ballot_count(),
        candidates.len(),
        seats,
        quota
    );

    let mut open_seats = seats as i64;
    let mut is_elected = vec![false; candidates.len()];
    let mut rounds: Vec<TabulationRound> = Vec::new();

    // The synthetic zero round: everything unelected, snapshot at the top
    // threshold. Display layers strip it before stepping through rounds.
    rounds.push(TabulationRound {
        elected: None,
        reweighing: Vec::new(),
        unelected: candidates.iter().map(|c| c.name.clone()).collect(),
        threshold: MAX_SCORE,
        weights: snapshot_at_threshold(&candidates, &arena, MAX_SCORE),
    });

    // Main phase: descending approval thresholds.
    for threshold in (1..=MAX_SCORE).rev() {
        loop {
            let filter = BallotFilter::AtLeast(threshold);
            let thresholded: Vec<usize> = (0..candidates.len())
                .filter(|&ci| !is_elected[ci])
                .filter(|&ci| filtered_weight(&candidates[ci], &arena, filter) >= quota)
                .collect();
            if thresholded.is_empty() {
                break;
            }
            debug!(
                "run_tabulation: threshold {} thresholded set {:?}",
                threshold, thresholded
            );

            let values: Vec<(usize, f64)> = thresholded
                .iter()
                .map(|&ci| {
                    let ws = filtered_weights(&candidates[ci], &arena, filter);
                    (ci, transfer_value(&ws, quota, EPSILON))
                })
                .collect();
            let min_value = values
                .iter()
                .map(|&(_, v)| v)
                .fold(f64::INFINITY, |a, b| a.min(b));
            let minimal: Vec<usize> = values
                .iter()
                .filter(|&&(_, v)| v == min_value)
                .map(|&(ci, _)| ci)
                .collect();
            let winner = if minimal.len() > 1 {
                break_tie(&minimal, &candidates, &arena, filter, rng)
            } else {
                minimal[0]
            };
            debug!(
                "run_tabulation: electing {} at threshold {} with transfer value {}",
                candidates[winner].name, threshold, min_value
            );

            // Snapshot before the deduction: the round shows the support that
            // elected the candidate, not what remains afterwards.
            let weights = snapshot_at_threshold(&candidates, &arena, threshold);

            let counted: Vec<usize> = candidates[winner]
                .ballots
                .iter()
                .filter(|&&(_, s)| filter.accepts(s))
                .map(|&(b, _)| b)
                .collect();
            let reweighing = reweighing_notice(winner, &counted, &arena);

            for &b in counted.iter() {
                let w = arena[b].weight;
                arena[b].weight = w - w.min(min_value);
            }

            open_seats -= 1;
            is_elected[winner] = true;

            // The notice round precedes the election round it belongs to.
            if !reweighing.is_empty() {
                rounds.push(TabulationRound {
                    elected: None,
                    reweighing: reweighing
                        .iter()
                        .map(|&ci| candidates[ci].name.clone())
                        .collect(),
                    unelected: Vec::new(),
                    threshold,
                    weights: weights.clone(),
                });
            }
            rounds.push(TabulationRound {
                elected: Some(candidates[winner].name.clone()),
                reweighing: Vec::new(),
                unelected: unelected_names(&candidates, &is_elected),
                threshold,
                weights,
            });
        }
    }

    // Runoff: fill the remaining seats by raw positive-score support.
    while open_seats > 0 {
        let unelected: Vec<usize> = (0..candidates.len()).filter(|&ci| !is_elected[ci]).collect();
        if unelected.is_empty() {
            debug!("run_tabulation: {} seats left unfilled, no candidates remain", open_seats);
            break;
        }
        let filter = BallotFilter::Positive;
        let support: Vec<(usize, f64)> = unelected
            .iter()
            .map(|&ci| (ci, filtered_weight(&candidates[ci], &arena, filter)))
            .collect();
        let max_support = support
            .iter()
            .map(|&(_, v)| v)
            .fold(f64::NEG_INFINITY, |a, b| a.max(b));
        let leaders: Vec<usize> = support
            .iter()
            .filter(|&&(_, v)| v == max_support)
            .map(|&(ci, _)| ci)
            .collect();
        let winner = if leaders.len() > 1 {
            break_tie(&leaders, &candidates, &arena, filter, rng)
        } else {
            leaders[0]
        };
        debug!(
            "run_tabulation: runoff electing {} with support {}",
            candidates[winner].name, max_support
        );

        // Snapshot before zeroing: unelected candidates show their positive
        // support, elected ones their remaining total ballot weight.
        let mut weights: BTreeMap<String, f64> = BTreeMap::new();
        for &(ci, w) in support.iter() {
            weights.insert(candidates[ci].name.clone(), w);
        }
        for (ci, candidate) in candidates.iter().enumerate() {
            if is_elected[ci] {
                let total: f64 = candidate
                    .ballots
                    .iter()
                    .map(|&(b, _)| arena[b].weight)
                    .sum();
                weights.insert(candidate.name.clone(), total);
            }
        }

        let counted: Vec<usize> = candidates[winner]
            .ballots
            .iter()
            .filter(|&&(_, s)| s > 0)
            .map(|&(b, _)| b)
            .collect();
        let reweighing = reweighing_notice(winner, &counted, &arena);

        // Runoff transfers are total: a contributing ballot is spent outright.
        for &b in counted.iter() {
            arena[b].weight = 0.0;
        }

        open_seats -= 1;
        is_elected[winner] = true;

        rounds.push(TabulationRound {
            elected: Some(candidates[winner].name.clone()),
            reweighing: reweighing
                .iter()
                .map(|&ci| candidates[ci].name.clone())
                .collect(),
            unelected: unelected_names(&candidates, &is_elected),
            threshold: 0,
            weights,
        });
    }

    info!(
        "run_tabulation: done, {} rounds, elected {:?}",
        rounds.len(),
        rounds
            .iter()
            .filter_map(|r| r.elected.as_deref())
            .collect::<Vec<_>>()
    );
    Ok(TabulationResult {
        rounds,
        quota,
        seats,
    })
}
