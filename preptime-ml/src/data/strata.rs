//! Quantile stratification of a continuous target.

/// Linear-interpolation quantile of an ascending slice (`p` in `[0, 1]`).
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Interior breakpoints splitting `targets` into `bins` quantile buckets.
/// Duplicate breakpoints (tied targets) are merged.
pub fn breakpoints(targets: &[f64], bins: usize) -> Vec<f64> {
    let mut sorted = targets.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut breaks: Vec<f64> = (1..bins)
        .map(|i| quantile(&sorted, i as f64 / bins as f64))
        .collect();
    breaks.dedup();
    breaks
}

/// Group row positions by target quantile bucket.
///
/// A value equal to a breakpoint falls in the lower bucket. Buckets left empty
/// by ties are dropped, so every returned group is non-empty and groups are
/// ordered from lowest to highest target. Positions within a group are ascending.
pub fn stratify(targets: &[f64], bins: usize) -> Vec<Vec<usize>> {
    if targets.is_empty() {
        return Vec::new();
    }
    let breaks = breakpoints(targets, bins.max(1));
    let mut groups = vec![Vec::new(); breaks.len() + 1];
    for (pos, &value) in targets.iter().enumerate() {
        let bucket = breaks.partition_point(|&b| b < value);
        groups[bucket].push(pos);
    }
    groups.retain(|g| !g.is_empty());
    groups
}
