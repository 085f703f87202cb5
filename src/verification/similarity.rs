//! Sequence similarity and close-match lookup.
//!
//! DESIGN
//! ======
//! Ratcliff/Obershelp "gestalt" matching: find the longest common
//! contiguous block, then recurse on the pieces to its left and right.
//! The similarity ratio is `2 * matched / (len(a) + len(b))`.
//!
//! Ties on block size resolve to the block starting earliest in `a`, then
//! earliest in `b`. No junk heuristic is applied; inputs here are single
//! words and short field values.

/// Default number of suggestions returned for a mismatched field.
pub const DEFAULT_MATCH_COUNT: usize = 1;
/// Minimum ratio a candidate needs to be suggested.
pub const DEFAULT_CUTOFF: f64 = 0.6;

/// Longest common block `(i, j, size)` of `a[alo..ahi]` and `b[blo..bhi]`.
fn longest_match(a: &[char], b: &[char], alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // prev[j - blo + 1] = length of the match ending at (i - 1, j).
    let width = bhi - blo;
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let slot = j - blo + 1;
            if a[i] == b[j] {
                let k = prev[slot - 1] + 1;
                curr[slot] = k;
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            } else {
                curr[slot] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    (best_i, best_j, best_size)
}

/// Total number of characters in matching blocks.
fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }

    total
}

/// Similarity ratio in `[0.0, 1.0]`. Two empty strings are identical.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(&a, &b) as f64 / total as f64
}

/// Best `n` candidates whose ratio against `word` is at least `cutoff`.
///
/// Ordered by score descending; equal scores put the lexicographically
/// greater candidate first. Duplicate candidates are kept.
#[must_use]
pub fn close_matches<'a, I>(word: &str, candidates: I, n: usize, cutoff: f64) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    if n == 0 || !(0.0..=1.0).contains(&cutoff) {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &str)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let score = ratio(candidate, word);
            (score >= cutoff).then_some((score, candidate))
        })
        .collect();

    scored.sort_by(|(sa, ca), (sb, cb)| sb.total_cmp(sa).then_with(|| cb.cmp(ca)));
    scored
        .into_iter()
        .take(n)
        .map(|(_, candidate)| candidate.to_owned())
        .collect()
}

#[cfg(test)]
#[path = "similarity_test.rs"]
mod tests;
