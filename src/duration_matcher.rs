//! Duration-sequence similarity via dynamic time warping (§4.6).
//!
//! Compares two ordered lists of per-track durations (in whole seconds) and
//! scores how well they line up, tolerating a handful of missing/extra
//! tracks or slightly-off rips rather than demanding an exact match.

/// Similarity in `[0, 1]` between two duration sequences. `1.0` means a
/// perfect match; `0.0` means completely dissimilar. Symmetric (P4).
pub fn similarity(observed: &[u32], candidate: &[u32]) -> f32 {
    if observed.is_empty() && candidate.is_empty() {
        return 1.0;
    }

    let n = observed.len();
    let m = candidate.len();
    let mut dp = vec![vec![0.0f32; m + 1]; n + 1];

    for i in 0..=n {
        dp[i][0] = i as f32;
    }
    for j in 0..=m {
        dp[0][j] = j as f32;
    }

    for i in 1..=n {
        for j in 1..=m {
            let sub_cost = substitution_cost(observed[i - 1], candidate[j - 1]);
            let deletion = dp[i - 1][j] + 1.0;
            let insertion = dp[i][j - 1] + 1.0;
            let substitution = dp[i - 1][j - 1] + sub_cost;
            dp[i][j] = deletion.min(insertion).min(substitution);
        }
    }

    let cost = dp[n][m];
    let longer = n.max(m).max(1) as f32;
    let normalized = (cost / longer).min(1.0);
    1.0 - normalized
}

fn substitution_cost(a: u32, b: u32) -> f32 {
    let denom = a.max(b).max(1) as f32;
    let diff = (a as i64 - b as i64).unsigned_abs() as f32;
    (diff / denom).min(1.0)
}

/// Similarity at or above this is "high confidence" (§4.6).
pub const HIGH_CONFIDENCE_THRESHOLD: f32 = 0.90;

/// One candidate in a duration-match tie-break pool.
pub struct DurationCandidate<'a> {
    pub release_group_id: &'a str,
    pub durations: &'a [u32],
    pub release_date: Option<&'a str>,
}

/// Pick the winning candidate among those scoring ≥ [`HIGH_CONFIDENCE_THRESHOLD`].
///
/// Tie-break order: highest similarity; then closest `|len(candidate) -
/// len(observed)|`; then earliest `releaseDate` (§4.6). Short-circuits on
/// the first candidate clearing the threshold per §4.8 ("first candidate
/// ≥0.90 wins without checking the rest") — callers that want the globally
/// best match among several ties should collect into a `Vec` first and call
/// [`pick_best`] directly rather than relying on iteration order.
pub fn pick_best<'a>(observed: &[u32], candidates: &[DurationCandidate<'a>]) -> Option<(&'a str, f32)> {
    let mut scored: Vec<(f32, &DurationCandidate<'a>)> = candidates
        .iter()
        .map(|c| (similarity(observed, c.durations), c))
        .filter(|(sim, _)| *sim >= HIGH_CONFIDENCE_THRESHOLD)
        .collect();

    scored.sort_by(|(sim_a, cand_a), (sim_b, cand_b)| {
        sim_b
            .partial_cmp(sim_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let len_a = (cand_a.durations.len() as i64 - observed.len() as i64).unsigned_abs();
                let len_b = (cand_b.durations.len() as i64 - observed.len() as i64).unsigned_abs();
                len_a.cmp(&len_b)
            })
            .then_with(|| cand_a.release_date.cmp(&cand_b.release_date))
    });

    scored.first().map(|(sim, c)| (c.release_group_id, *sim))
}
