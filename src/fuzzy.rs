// src/fuzzy.rs - Layered fuzzy matcher: exact containment > subsequence > bounded edit distance

// ===== SCORING CONSTANTS =====

// Exact containment always scores 1.0; subsequence scores live in
// (SUBSEQUENCE_FLOOR, 1.0); edit-distance scores stay strictly below
// SUBSEQUENCE_FLOOR so the three tiers never interleave.
const SUBSEQUENCE_FLOOR: f64 = 0.6;
const SUBSEQUENCE_RANGE: f64 = 0.4;

/// Maximum number of edits (insert/delete/substitute) tolerated by the
/// sliding-window fallback.
pub const EDIT_TOLERANCE: usize = 2;

/// A successful match against a single text.
///
/// `score` is in (0, 1]; it is exactly 1.0 iff the query occurs contiguously
/// in the text under the active case policy. `indices` are char indices into
/// the original (un-folded) text, suitable for highlighting: contiguous for
/// containment and edit-distance matches, strictly increasing with one entry
/// per query char for subsequence matches.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    pub score: f64,
    pub indices: Vec<usize>,
}

/// Best match across a sequence of searchable fields.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMatch {
    /// Index of the winning field in the input sequence.
    pub field: usize,
    pub score: f64,
    pub indices: Vec<usize>,
}

// Case folding is per-char to keep a 1:1 mapping between folded chars and
// positions in the original text. Multi-char lowercase expansions keep the
// original char so the mapping never drifts.
fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(first), None) => first,
        _ => c,
    }
}

fn fold(s: &str, case_sensitive: bool) -> Vec<char> {
    if case_sensitive {
        s.chars().collect()
    } else {
        s.chars().map(fold_char).collect()
    }
}

/// Match `query` against `text`, returning a score and highlight indices.
///
/// Rules are tried in priority order and the first applicable one wins:
///
/// 1. Contiguous containment: score exactly 1.0, indices cover the first
///    occurrence.
/// 2. Subsequence: every query char appears in order. Score decreases as the
///    matched chars spread further apart, but always exceeds any
///    edit-distance score.
/// 3. Bounded edit distance: a sliding window of `text` within
///    [`EDIT_TOLERANCE`] edits of `query`. Fewer edits score higher; the
///    score is always below the subsequence tier.
///
/// Empty query or empty text never match.
pub fn match_text(query: &str, text: &str, case_sensitive: bool) -> Option<FuzzyMatch> {
    if query.is_empty() || text.is_empty() {
        return None;
    }

    let q = fold(query, case_sensitive);
    let t = fold(text, case_sensitive);

    if let Some(start) = find_contiguous(&q, &t) {
        return Some(FuzzyMatch {
            score: 1.0,
            indices: (start..start + q.len()).collect(),
        });
    }

    if let Some(indices) = subsequence_indices(&q, &t) {
        // span == q.len() would be a contiguous occurrence, already handled
        // above, so the ratio here is strictly below 1.
        let span = (indices[indices.len() - 1] - indices[0] + 1) as f64;
        let score = SUBSEQUENCE_FLOOR + SUBSEQUENCE_RANGE * (q.len() as f64 / span);
        return Some(FuzzyMatch { score, indices });
    }

    edit_window_match(&q, &t)
}

/// Match `query` against each field and return the highest-scoring result,
/// or `None` if no field matches. Ties resolve to the earliest field. A 1.0
/// score short-circuits the scan since no later field can beat it.
pub fn match_fields(query: &str, fields: &[String], case_sensitive: bool) -> Option<FieldMatch> {
    let mut best: Option<FieldMatch> = None;
    for (i, field) in fields.iter().enumerate() {
        if let Some(m) = match_text(query, field, case_sensitive) {
            let exact = m.score == 1.0;
            if best.as_ref().is_none_or(|b| m.score > b.score) {
                best = Some(FieldMatch {
                    field: i,
                    score: m.score,
                    indices: m.indices,
                });
            }
            if exact {
                break;
            }
        }
    }
    best
}

// First index where `q` occurs contiguously in `t`, if any.
fn find_contiguous(q: &[char], t: &[char]) -> Option<usize> {
    if q.len() > t.len() {
        return None;
    }
    (0..=t.len() - q.len()).find(|&start| t[start..start + q.len()] == *q)
}

// Greedy leftmost in-order walk. One index per query char, strictly
// increasing, or None if some query char cannot be placed.
fn subsequence_indices(q: &[char], t: &[char]) -> Option<Vec<usize>> {
    let mut indices = Vec::with_capacity(q.len());
    let mut pos = 0;
    for &qc in q {
        let found = t[pos..].iter().position(|&tc| tc == qc)?;
        indices.push(pos + found);
        pos += found + 1;
    }
    Some(indices)
}

// Slide windows of length q.len() +/- EDIT_TOLERANCE across the text and keep
// the window with the fewest edits. More than EDIT_TOLERANCE edits in every
// window means no match.
fn edit_window_match(q: &[char], t: &[char]) -> Option<FuzzyMatch> {
    if q.len() > t.len() + EDIT_TOLERANCE {
        return None;
    }

    let min_len = q.len().saturating_sub(EDIT_TOLERANCE).max(1);
    let max_len = (q.len() + EDIT_TOLERANCE).min(t.len());

    let mut best: Option<(usize, usize, usize)> = None; // (distance, start, len)
    for len in min_len..=max_len {
        for start in 0..=t.len() - len {
            let dist = levenshtein(q, &t[start..start + len]);
            if dist <= EDIT_TOLERANCE && best.is_none_or(|(d, _, _)| dist < d) {
                best = Some((dist, start, len));
            }
        }
    }

    best.map(|(dist, start, len)| FuzzyMatch {
        // dist == 0 would have been caught by the containment rule, so the
        // score here is always strictly below the subsequence floor.
        score: SUBSEQUENCE_FLOOR * (1.0 - dist as f64 / (EDIT_TOLERANCE + 1) as f64),
        indices: (start..start + len).collect(),
    })
}

// Classic two-row Levenshtein over char slices.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, &ac) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &bc) in b.iter().enumerate() {
            let cost = if ac == bc { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
