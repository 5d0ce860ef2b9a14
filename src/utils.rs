//! Small numeric helpers shared by the recursions.
//!
//! Log-domain reductions, deterministic arg-extrema and sup-norm distances.

/// `log Σ exp(v_i)` without overflow or premature underflow.
///
/// Returns `-∞` for an empty slice or when every entry is `-∞`.
#[inline]
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY || max == f64::INFINITY {
        return max;
    }
    let sum: f64 = values.iter().map(|&v| (v - max).exp()).sum();
    max + sum.ln()
}

/// Index and value of the first maximal entry.
///
/// Later entries replace the incumbent only when strictly greater, so ties
/// resolve to the lowest index. NaN entries are never selected.
#[inline]
pub fn argmax_first(values: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &v) in values.iter().enumerate() {
        match best {
            None if !v.is_nan() => best = Some((idx, v)),
            Some((_, b)) if v > b => best = Some((idx, v)),
            _ => {}
        }
    }
    best
}

/// Index and value of the first minimal entry; see [`argmax_first`].
#[inline]
pub fn argmin_first(values: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &v) in values.iter().enumerate() {
        match best {
            None if !v.is_nan() => best = Some((idx, v)),
            Some((_, b)) if v < b => best = Some((idx, v)),
            _ => {}
        }
    }
    best
}

/// Normalize non-negative weights to a probability vector.
///
/// Returns `None` when the weights sum to zero or to a non-finite value.
pub fn normalize(weights: &[f64]) -> Option<Vec<f64>> {
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 || !sum.is_finite() {
        return None;
    }
    Some(weights.iter().map(|&w| w / sum).collect())
}

/// Exponentiate and normalize log-weights.
///
/// Returns `None` when every log-weight is `-∞`.
pub fn normalize_log(log_weights: &[f64]) -> Option<Vec<f64>> {
    let total = log_sum_exp(log_weights);
    if !total.is_finite() {
        return None;
    }
    Some(log_weights.iter().map(|&w| (w - total).exp()).collect())
}

/// `|a - b|`, treating equal infinities as identical.
#[inline]
pub fn value_gap(a: f64, b: f64) -> f64 {
    if a == b {
        0.0
    } else {
        (a - b).abs()
    }
}

/// Sup-norm distance between two value functions.
pub fn sup_distance(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(&x, &y)| value_gap(x, y))
        .fold(0.0, f64::max)
}

/// Heuristic minimum chunk length (≈ √n) for splitting `n` independent jobs
/// across rayon workers.
#[inline]
pub fn default_chunk_len(num_jobs: usize) -> usize {
    if num_jobs <= 1 {
        1
    } else {
        (num_jobs as f64).sqrt().ceil() as usize
    }
}
