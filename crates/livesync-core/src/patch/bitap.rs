//! Approximate string location using the Bitap (shift-or) algorithm.
//!
//! Finds the best place for a hunk's context in text that may have drifted
//! from the text the hunk was computed against. A candidate is scored by how
//! many errors it needs (relative to the pattern length) plus how far it sits
//! from the expected offset (relative to `match_distance`); candidates scoring
//! above `match_threshold` are rejected.

use super::{PatchConfig, find_chars, rfind_chars};
use std::collections::HashMap;

/// Longest pattern the bit-parallel matcher accepts.
///
/// Longer hunks are located by matching their first and last
/// `MATCH_MAX_BITS` characters separately.
pub const MATCH_MAX_BITS: usize = 32;

/// Locate `pattern` in `text` near `loc`.
///
/// Tries an exact match at the expected offset before falling back to a
/// fuzzy search. Returns `None` when nothing scores within the threshold.
pub(crate) fn locate(
    text: &[char],
    pattern: &[char],
    loc: usize,
    config: &PatchConfig,
) -> Option<usize> {
    let loc = loc.min(text.len());

    if text == pattern {
        return Some(0);
    }
    if text.is_empty() {
        return None;
    }
    if loc + pattern.len() <= text.len() && text[loc..loc + pattern.len()] == *pattern {
        return Some(loc);
    }
    if pattern.is_empty() || pattern.len() > MATCH_MAX_BITS {
        return None;
    }

    bitap(text, pattern, loc, config)
}

/// Bit mask of positions for each character in the pattern.
fn alphabet(pattern: &[char]) -> HashMap<char, u64> {
    let mut masks = HashMap::new();
    for (i, c) in pattern.iter().enumerate() {
        *masks.entry(*c).or_insert(0) |= 1u64 << (pattern.len() - i - 1);
    }
    masks
}

fn at(row: &[u64], index: usize) -> u64 {
    row.get(index).copied().unwrap_or(0)
}

fn bitap(text: &[char], pattern: &[char], loc: usize, config: &PatchConfig) -> Option<usize> {
    let masks = alphabet(pattern);

    let score = |errors: usize, x: usize| -> f64 {
        let accuracy = errors as f64 / pattern.len() as f64;
        let proximity = loc.abs_diff(x);
        if config.match_distance == 0 {
            return if proximity == 0 { accuracy } else { 1.0 };
        }
        accuracy + proximity as f64 / config.match_distance as f64
    };

    // An exact occurrence anywhere nearby bounds how good a fuzzy match must be.
    let mut threshold = config.match_threshold;
    if let Some(exact) = find_chars(text, pattern, loc) {
        threshold = threshold.min(score(0, exact));
        if let Some(exact) = rfind_chars(text, pattern, loc + pattern.len()) {
            threshold = threshold.min(score(0, exact));
        }
    }

    let match_mask = 1u64 << (pattern.len() - 1);
    let mut best = None;
    let mut bin_max = pattern.len() + text.len();
    let mut last_rd: Vec<u64> = Vec::new();

    for errors in 0..pattern.len() {
        // Binary search for how far from `loc` a match with this many errors
        // could still score within the threshold.
        let mut bin_min = 0;
        let mut bin_mid = bin_max;
        while bin_min < bin_mid {
            if score(errors, loc + bin_mid) <= threshold {
                bin_min = bin_mid;
            } else {
                bin_max = bin_mid;
            }
            bin_mid = (bin_max - bin_min) / 2 + bin_min;
        }
        bin_max = bin_mid;

        let mut start = (loc as isize - bin_mid as isize + 1).max(1) as usize;
        let finish = (loc + bin_mid).min(text.len()) + pattern.len();

        let mut rd = vec![0u64; finish + 2];
        rd[finish + 1] = (1u64 << errors) - 1;

        let mut j = finish;
        while j >= start {
            let char_match = text
                .get(j - 1)
                .and_then(|c| masks.get(c))
                .copied()
                .unwrap_or(0);

            let exact = ((rd[j + 1] << 1) | 1) & char_match;
            rd[j] = if errors == 0 {
                exact
            } else {
                exact
                    | (((at(&last_rd, j + 1) | at(&last_rd, j)) << 1) | 1)
                    | at(&last_rd, j + 1)
            };

            if rd[j] & match_mask != 0 {
                let candidate = score(errors, j - 1);
                if candidate <= threshold {
                    threshold = candidate;
                    best = Some(j - 1);
                    if j - 1 > loc {
                        // Don't wander further right than we are left of `loc`.
                        start = (2 * loc as isize - (j - 1) as isize).max(1) as usize;
                    } else {
                        break;
                    }
                }
            }
            j -= 1;
        }

        if score(errors + 1, loc) > threshold {
            break;
        }
        last_rd = rd;
    }

    best
}
