//! Case- and punctuation-insensitive name similarity.

/// Minimum similarity for a fuzzy catalog match.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;

/// Scores closer than this are treated as a tie.
const TIE_EPSILON: f64 = 1e-9;

/// Lowercase alphanumerics only. `X-Type`, `X Type` and `xtype` share a key.
pub fn fold_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Similarity in `0.0..=1.0` between two names after folding.
///
/// `1.0` means the folded keys are identical; otherwise it is one minus the
/// Levenshtein distance over the longer key's length.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = fold_key(a);
    let b = fold_key(b);
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len()) as f64;
    1.0 - levenshtein_distance(&a, &b) as f64 / longest
}

/// Picks the single best candidate scoring at least `threshold`.
///
/// Returns the candidate index and its score. A tie for first place is
/// ambiguous and yields `None`.
pub fn best_match<'a, I>(query: &str, candidates: I, threshold: f64) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, f64)> = None;
    let mut tied = false;

    for (idx, candidate) in candidates.into_iter().enumerate() {
        let score = similarity(query, candidate);
        if score < threshold {
            continue;
        }
        match best {
            Some((_, best_score)) if (score - best_score).abs() <= TIE_EPSILON => tied = true,
            Some((_, best_score)) if score < best_score => {}
            _ => {
                best = Some((idx, score));
                tied = false;
            }
        }
    }

    if tied {
        None
    } else {
        best
    }
}

fn levenshtein_distance(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
