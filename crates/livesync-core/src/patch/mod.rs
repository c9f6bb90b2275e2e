//! Context-anchored text patches.
//!
//! A [`Patch`] records how one snapshot of a document turned into another, as
//! hunks of equal/insert/delete ops wrapped in a few characters of unchanged
//! context. Because each hunk carries its own context, a patch can be applied
//! to text that has drifted from the snapshot it was computed against: the
//! hunk is located by its context (exactly if possible, approximately
//! otherwise) instead of by absolute offset.
//!
//! This is what lets an external change be folded into a buffer that holds
//! unsaved local edits without clobbering them.
//!
//! All offsets and lengths are in `char`s, not bytes.

mod bitap;

pub use bitap::MATCH_MAX_BITS;

use serde::{Deserialize, Serialize};
use similar::{Algorithm, ChangeTag, TextDiff};
use std::time::Duration;

/// Tuning knobs for computing and applying patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Characters of unchanged context kept on each side of a hunk.
    pub margin: usize,
    /// Worst acceptable fuzzy match score (0.0 = perfect, 1.0 = anything).
    pub match_threshold: f64,
    /// How far from its expected offset a hunk may be found. A match this
    /// many characters away costs as much as a fully wrong pattern.
    pub match_distance: usize,
    /// For long hunks, the largest fraction of the located text that may
    /// differ from the hunk's source before the hunk is rejected.
    pub delete_threshold: f64,
    /// Equalities shorter than this, sandwiched between edits, are folded
    /// into the surrounding edit.
    pub edit_cost: usize,
    /// Upper bound on time spent computing a single diff.
    pub diff_timeout_ms: u64,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            margin: 4,
            match_threshold: 0.5,
            match_distance: 1000,
            delete_threshold: 0.5,
            edit_cost: 4,
            diff_timeout_ms: 1000,
        }
    }
}

impl PatchConfig {
    pub fn diff_timeout(&self) -> Duration {
        Duration::from_millis(self.diff_timeout_ms)
    }
}

/// A single span of a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "text", rename_all = "lowercase")]
pub enum Op {
    Equal(String),
    Insert(String),
    Delete(String),
}

impl Op {
    pub fn text(&self) -> &str {
        match self {
            Op::Equal(text) | Op::Insert(text) | Op::Delete(text) => text,
        }
    }

    pub fn char_len(&self) -> usize {
        self.text().chars().count()
    }

    fn from_tag(tag: ChangeTag, text: &str) -> Self {
        match tag {
            ChangeTag::Equal => Op::Equal(text.to_string()),
            ChangeTag::Insert => Op::Insert(text.to_string()),
            ChangeTag::Delete => Op::Delete(text.to_string()),
        }
    }
}

/// One located edit: its ops plus where it sat when the patch was made.
///
/// `source_start` is relative to the source text with all earlier hunks of
/// the same patch already applied; `target_start` is relative to the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub ops: Vec<Op>,
    pub source_start: usize,
    pub target_start: usize,
    pub source_len: usize,
    pub target_len: usize,
}

impl Hunk {
    /// The text this hunk expects to find (context plus deleted spans).
    pub fn source_text(&self) -> String {
        self.ops
            .iter()
            .filter(|op| !matches!(op, Op::Insert(_)))
            .map(Op::text)
            .collect()
    }

    /// The text this hunk leaves behind (context plus inserted spans).
    pub fn target_text(&self) -> String {
        self.ops
            .iter()
            .filter(|op| !matches!(op, Op::Delete(_)))
            .map(Op::text)
            .collect()
    }
}

/// An ordered list of hunks turning one text into another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    hunks: Vec<Hunk>,
}

impl Patch {
    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    pub fn len(&self) -> usize {
        self.hunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty()
    }
}

/// Compute the patch that turns `source` into `target`.
///
/// Deterministic: identical inputs always produce identical patches.
pub fn diff(source: &str, target: &str, config: &PatchConfig) -> Patch {
    let ops = cleanup(diff_ops(source, target, config.diff_timeout()), config.edit_cost);
    make_hunks(source, &ops, config.margin)
}

/// Apply `patch` to `text`, returning the patched text and, per hunk, whether
/// it could be placed.
///
/// Hunks that cannot be located are skipped and leave their region of the
/// text untouched. This never fails as a whole.
pub fn apply(patch: &Patch, text: &str, config: &PatchConfig) -> (String, Vec<bool>) {
    if patch.is_empty() {
        return (text.to_string(), Vec::new());
    }

    let mut hunks = patch.hunks.clone();
    let padding = add_padding(&mut hunks, config.margin);

    let mut chars: Vec<char> = padding
        .iter()
        .copied()
        .chain(text.chars())
        .chain(padding.iter().copied())
        .collect();

    let mut applied = Vec::with_capacity(hunks.len());
    let mut delta: isize = 0;

    for hunk in &hunks {
        let expected = (hunk.target_start as isize + delta).max(0) as usize;
        let source: Vec<char> = hunk.source_text().chars().collect();

        let mut end_loc = None;
        let start_loc = if source.len() > MATCH_MAX_BITS {
            // Too long for the bit-parallel matcher: anchor both ends.
            let head = &source[..MATCH_MAX_BITS];
            let tail = &source[source.len() - MATCH_MAX_BITS..];
            bitap::locate(&chars, head, expected, config).and_then(|start| {
                let tail_expected = expected + source.len() - MATCH_MAX_BITS;
                match bitap::locate(&chars, tail, tail_expected, config) {
                    Some(end) if start < end => {
                        end_loc = Some(end);
                        Some(start)
                    }
                    _ => None,
                }
            })
        } else {
            bitap::locate(&chars, &source, expected, config)
        };

        let Some(start) = start_loc else {
            applied.push(false);
            // Later hunks were positioned assuming this one landed.
            delta -= hunk.target_len as isize - hunk.source_len as isize;
            continue;
        };
        delta = start as isize - hunk.target_start as isize;

        let located_end = match end_loc {
            Some(end) => end + MATCH_MAX_BITS,
            None => start + source.len(),
        }
        .min(chars.len());
        let located = &chars[start..located_end];

        if located == source.as_slice() {
            chars.splice(start..located_end, hunk.target_text().chars());
            applied.push(true);
            continue;
        }

        // The context drifted: map the hunk's offsets through a diff between
        // what it expected and what is actually there.
        let expected_text: String = source.iter().collect();
        let located_text: String = located.iter().collect();
        let drift = diff_ops(&expected_text, &located_text, config.diff_timeout());

        if source.len() > MATCH_MAX_BITS
            && levenshtein(&drift) as f64 / source.len() as f64 > config.delete_threshold
        {
            applied.push(false);
            continue;
        }

        let mut index = 0;
        for op in &hunk.ops {
            let len = op.char_len();
            match op {
                Op::Insert(text) => {
                    let at = (start + x_index(&drift, index)).min(chars.len());
                    chars.splice(at..at, text.chars());
                }
                Op::Delete(_) => {
                    let to = (start + x_index(&drift, index + len)).min(chars.len());
                    let from = (start + x_index(&drift, index)).min(to);
                    chars.drain(from..to);
                }
                Op::Equal(_) => {}
            }
            if !matches!(op, Op::Delete(_)) {
                index += len;
            }
        }
        applied.push(true);
    }

    let patched: String = chars.into_iter().collect();
    (strip_padding(&patched, &padding), applied)
}

/// Raw character diff of two texts, adjacent spans of the same kind merged.
pub(crate) fn diff_ops(source: &str, target: &str, timeout: Duration) -> Vec<Op> {
    if source == target {
        return if source.is_empty() {
            Vec::new()
        } else {
            vec![Op::Equal(source.to_string())]
        };
    }

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(timeout)
        .diff_chars(source, target);

    let mut ops: Vec<Op> = Vec::new();
    for change in diff.iter_all_changes() {
        let value = change.value();
        match (change.tag(), ops.last_mut()) {
            (ChangeTag::Equal, Some(Op::Equal(text)))
            | (ChangeTag::Insert, Some(Op::Insert(text)))
            | (ChangeTag::Delete, Some(Op::Delete(text))) => text.push_str(value),
            (tag, _) => ops.push(Op::from_tag(tag, value)),
        }
    }
    ops
}

/// Fold trivially short equalities into the edits around them, then merge.
///
/// A char-level diff of `World` → `Planet` keeps the shared `l` as an
/// equality; as a patch that is harder to relocate than a plain replacement.
fn cleanup(ops: Vec<Op>, edit_cost: usize) -> Vec<Op> {
    let last = ops.len().saturating_sub(1);
    let mut folded = Vec::with_capacity(ops.len());
    for (i, op) in ops.into_iter().enumerate() {
        match op {
            Op::Equal(text) if i > 0 && i < last && text.chars().count() < edit_cost => {
                folded.push(Op::Delete(text.clone()));
                folded.push(Op::Insert(text));
            }
            other => folded.push(other),
        }
    }
    merge(folded)
}

/// Collapse each run of edits into one delete and one insert, factoring any
/// shared prefix or suffix back out into the neighbouring equalities.
fn merge(ops: Vec<Op>) -> Vec<Op> {
    let mut merged: Vec<Op> = Vec::new();
    let mut deleted = String::new();
    let mut inserted = String::new();

    for op in ops.into_iter().chain(std::iter::once(Op::Equal(String::new()))) {
        match op {
            Op::Delete(text) => deleted.push_str(&text),
            Op::Insert(text) => inserted.push_str(&text),
            Op::Equal(text) => {
                if !deleted.is_empty() || !inserted.is_empty() {
                    let prefix = common_prefix(&deleted, &inserted);
                    if prefix > 0 {
                        push_equal(&mut merged, &deleted[..prefix]);
                        deleted.drain(..prefix);
                        inserted.drain(..prefix);
                    }

                    let suffix = common_suffix(&deleted, &inserted);
                    let tail = deleted[deleted.len() - suffix..].to_string();
                    deleted.truncate(deleted.len() - suffix);
                    inserted.truncate(inserted.len() - suffix);

                    if !deleted.is_empty() {
                        merged.push(Op::Delete(std::mem::take(&mut deleted)));
                    }
                    if !inserted.is_empty() {
                        merged.push(Op::Insert(std::mem::take(&mut inserted)));
                    }
                    push_equal(&mut merged, &tail);
                }
                push_equal(&mut merged, &text);
            }
        }
    }
    merged
}

fn push_equal(ops: &mut Vec<Op>, text: &str) {
    if text.is_empty() {
        return;
    }
    match ops.last_mut() {
        Some(Op::Equal(existing)) => existing.push_str(text),
        _ => ops.push(Op::Equal(text.to_string())),
    }
}

/// Byte length of the longest common prefix, on a char boundary.
fn common_prefix(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .sum()
}

/// Byte length of the longest common suffix, on a char boundary.
fn common_suffix(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .sum()
}

/// Group ops into hunks separated by long equalities.
fn make_hunks(source: &str, ops: &[Op], margin: usize) -> Patch {
    let mut hunks = Vec::new();
    if ops.iter().all(|op| matches!(op, Op::Equal(_))) {
        return Patch { hunks };
    }

    let mut hunk = Hunk::default();
    let mut source_count = 0;
    let mut target_count = 0;
    // `prepatch` is the source with every finished hunk applied; context is
    // taken from it so each hunk matches the text it will actually meet.
    let mut prepatch: Vec<char> = source.chars().collect();
    let mut postpatch = prepatch.clone();

    for (i, op) in ops.iter().enumerate() {
        let len = op.char_len();
        if hunk.ops.is_empty() && !matches!(op, Op::Equal(_)) {
            hunk.source_start = source_count;
            hunk.target_start = target_count;
        }

        match op {
            Op::Insert(text) => {
                hunk.ops.push(op.clone());
                hunk.target_len += len;
                postpatch.splice(target_count..target_count, text.chars());
            }
            Op::Delete(_) => {
                hunk.ops.push(op.clone());
                hunk.source_len += len;
                postpatch.drain(target_count..target_count + len);
            }
            Op::Equal(_) => {
                if len <= 2 * margin && !hunk.ops.is_empty() && i + 1 != ops.len() {
                    // Short gap: keep it inside the current hunk.
                    hunk.ops.push(op.clone());
                    hunk.source_len += len;
                    hunk.target_len += len;
                } else if len >= 2 * margin && !hunk.ops.is_empty() {
                    add_context(&mut hunk, &prepatch, margin);
                    hunks.push(std::mem::take(&mut hunk));
                    prepatch = postpatch.clone();
                    source_count = target_count;
                }
            }
        }

        if !matches!(op, Op::Insert(_)) {
            source_count += len;
        }
        if !matches!(op, Op::Delete(_)) {
            target_count += len;
        }
    }

    if !hunk.ops.is_empty() {
        add_context(&mut hunk, &prepatch, margin);
        hunks.push(hunk);
    }

    Patch { hunks }
}

/// Surround a hunk with enough context to make it unique in `text`, plus
/// `margin` characters either side.
fn add_context(hunk: &mut Hunk, text: &[char], margin: usize) {
    if text.is_empty() {
        return;
    }

    let start = hunk.target_start.min(text.len());
    let end = (start + hunk.source_len).min(text.len());
    let mut padding = 0;

    if margin > 0 {
        let mut pattern = &text[start..end];
        while find_chars(text, pattern, 0) != rfind_chars(text, pattern, text.len())
            && pattern.len() < MATCH_MAX_BITS.saturating_sub(2 * margin)
        {
            padding += margin;
            let lo = start.saturating_sub(padding);
            let hi = (end + padding).min(text.len());
            pattern = &text[lo..hi];
        }
    }
    padding += margin;

    let prefix: String = text[start.saturating_sub(padding)..start].iter().collect();
    let suffix: String = text[end..(end + padding).min(text.len())].iter().collect();
    let prefix_len = prefix.chars().count();
    let suffix_len = suffix.chars().count();

    if !prefix.is_empty() {
        hunk.ops.insert(0, Op::Equal(prefix));
    }
    if !suffix.is_empty() {
        push_equal(&mut hunk.ops, &suffix);
    }

    hunk.source_start = hunk.source_start.saturating_sub(prefix_len);
    hunk.target_start = hunk.target_start.saturating_sub(prefix_len);
    hunk.source_len += prefix_len + suffix_len;
    hunk.target_len += prefix_len + suffix_len;
}

/// Give the first and last hunks context even at the very edges of the text
/// by padding both with sentinel characters. Returns the padding used.
fn add_padding(hunks: &mut [Hunk], margin: usize) -> Vec<char> {
    let padding: Vec<char> = (1..=margin as u32).filter_map(char::from_u32).collect();
    let n = padding.len();

    for hunk in hunks.iter_mut() {
        hunk.source_start += n;
        hunk.target_start += n;
    }

    if let Some(first) = hunks.first_mut() {
        let leading = match first.ops.first() {
            Some(Op::Equal(text)) => Some(text.chars().count()),
            _ => None,
        };
        let extra = match leading {
            None => {
                first.ops.insert(0, Op::Equal(padding.iter().collect()));
                n
            }
            Some(have) if have < n => {
                let missing: String = padding[have..].iter().collect();
                if let Some(Op::Equal(text)) = first.ops.first_mut() {
                    text.insert_str(0, &missing);
                }
                n - have
            }
            Some(_) => 0,
        };
        first.source_start -= extra;
        first.target_start -= extra;
        first.source_len += extra;
        first.target_len += extra;
    }

    if let Some(last) = hunks.last_mut() {
        let trailing = match last.ops.last() {
            Some(Op::Equal(text)) => Some(text.chars().count()),
            _ => None,
        };
        let extra = match trailing {
            None => {
                last.ops.push(Op::Equal(padding.iter().collect()));
                n
            }
            Some(have) if have < n => {
                let missing: String = padding[..n - have].iter().collect();
                if let Some(Op::Equal(text)) = last.ops.last_mut() {
                    text.push_str(&missing);
                }
                n - have
            }
            Some(_) => 0,
        };
        last.source_len += extra;
        last.target_len += extra;
    }

    padding
}

fn strip_padding(text: &str, padding: &[char]) -> String {
    let pad: String = padding.iter().collect();
    let is_pad = |c: char| padding.contains(&c);
    let text = text
        .strip_prefix(pad.as_str())
        .unwrap_or_else(|| text.trim_start_matches(is_pad));
    let text = text
        .strip_suffix(pad.as_str())
        .unwrap_or_else(|| text.trim_end_matches(is_pad));
    text.to_string()
}

/// Map a char offset in a diff's source to the equivalent offset in its
/// target. Offsets inside a deletion map to where the deletion happened.
fn x_index(ops: &[Op], loc: usize) -> usize {
    let (mut chars1, mut chars2) = (0, 0);
    let (mut last1, mut last2) = (0, 0);
    let mut in_delete = false;

    for op in ops {
        let len = op.char_len();
        if !matches!(op, Op::Insert(_)) {
            chars1 += len;
        }
        if !matches!(op, Op::Delete(_)) {
            chars2 += len;
        }
        if chars1 > loc {
            in_delete = matches!(op, Op::Delete(_));
            break;
        }
        last1 = chars1;
        last2 = chars2;
    }

    if in_delete {
        return last2;
    }
    last2 + (loc - last1)
}

/// Number of inserted, deleted or substituted characters in a diff.
fn levenshtein(ops: &[Op]) -> usize {
    let (mut total, mut inserted, mut deleted) = (0, 0, 0);
    for op in ops {
        match op {
            Op::Insert(_) => inserted += op.char_len(),
            Op::Delete(_) => deleted += op.char_len(),
            Op::Equal(_) => {
                total += inserted.max(deleted);
                inserted = 0;
                deleted = 0;
            }
        }
    }
    total + inserted.max(deleted)
}

/// First index at or after `from` where `needle` occurs.
pub(crate) fn find_chars(hay: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    let last = hay.len() - needle.len();
    if from > last {
        return None;
    }
    (from..=last).find(|&i| hay[i..i + needle.len()] == *needle)
}

/// Last index at or before `upto` where `needle` occurs.
pub(crate) fn rfind_chars(hay: &[char], needle: &[char], upto: usize) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    let last = (hay.len() - needle.len()).min(upto);
    (0..=last).rev().find(|&i| hay[i..i + needle.len()] == *needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PatchConfig {
        PatchConfig::default()
    }

    fn equal(s: &str) -> Op {
        Op::Equal(s.into())
    }

    fn insert(s: &str) -> Op {
        Op::Insert(s.into())
    }

    fn delete(s: &str) -> Op {
        Op::Delete(s.into())
    }

    // ==================== Diffing ====================

    #[test]
    fn test_diff_ops_identical_and_empty() {
        assert!(diff_ops("", "", Duration::from_secs(1)).is_empty());
        assert_eq!(diff_ops("abc", "abc", Duration::from_secs(1)), vec![equal("abc")]);
        assert_eq!(diff_ops("", "abc", Duration::from_secs(1)), vec![insert("abc")]);
        assert_eq!(diff_ops("abc", "", Duration::from_secs(1)), vec![delete("abc")]);
    }

    #[test]
    fn test_cleanup_folds_short_equalities() {
        let ops = vec![
            equal("Hello\n"),
            delete("Wor"),
            insert("P"),
            equal("l"),
            delete("d"),
            insert("anet"),
        ];
        assert_eq!(
            cleanup(ops, 4),
            vec![equal("Hello\n"), delete("World"), insert("Planet")]
        );
    }

    #[test]
    fn test_merge_factors_common_affixes() {
        let ops = vec![equal("a"), delete("xbcy"), insert("xdey"), equal("z")];
        assert_eq!(
            merge(ops),
            vec![equal("ax"), delete("bc"), insert("de"), equal("yz")]
        );
    }

    #[test]
    fn test_diff_of_identical_texts_is_empty() {
        assert!(diff("same text", "same text", &config()).is_empty());
        assert!(diff("", "", &config()).is_empty());
    }

    #[test]
    fn test_diff_hunk_carries_context() {
        let patch = diff("Hello\nWorld", "Hello\nPlanet", &config());
        assert_eq!(patch.len(), 1);
        let hunk = &patch.hunks()[0];
        assert_eq!(hunk.ops, vec![equal("llo\n"), delete("World"), insert("Planet")]);
        assert_eq!(hunk.source_text(), "llo\nWorld");
        assert_eq!(hunk.target_text(), "llo\nPlanet");
        assert_eq!(hunk.target_start, 2);
        assert_eq!(hunk.source_len, 9);
        assert_eq!(hunk.target_len, 10);
    }

    #[test]
    fn test_distant_changes_make_separate_hunks() {
        let source = "alpha beta gamma delta epsilon zeta eta theta";
        let target = "ALPHA beta gamma delta epsilon zeta eta THETA";
        let patch = diff(source, target, &config());
        assert_eq!(patch.len(), 2);
    }

    #[test]
    fn test_diff_is_deterministic() {
        let a = diff("one two three", "one 2 three four", &config());
        let b = diff("one two three", "one 2 three four", &config());
        assert_eq!(a, b);
    }

    #[test]
    fn test_patch_serializes_to_json() {
        let patch = diff("abc", "abd", &config());
        let json = serde_json::to_string(&patch).unwrap();
        assert!(json.contains("\"op\":\"delete\""));
        let back: Patch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, patch);
    }

    // ==================== Applying ====================

    #[test]
    fn test_apply_to_original_reproduces_target() {
        for (source, target) in [
            ("The quick brown fox.", "The slow brown dog."),
            ("", "brand new"),
            ("going away", ""),
            ("line one\nline two\nline three\n", "line one\nline 2\nline three\nline four\n"),
            (
                "A much longer paragraph that goes on well past the width of the matcher so the head and tail anchors are used.",
                "A much longer paragraph that goes on well past the width of the bit matcher so that head and tail anchors get used.",
            ),
        ] {
            let patch = diff(source, target, &config());
            let (patched, applied) = apply(&patch, source, &config());
            assert_eq!(patched, target, "{source:?} -> {target:?}");
            assert!(applied.iter().all(|ok| *ok));
        }
    }

    #[test]
    fn test_apply_empty_patch_is_identity() {
        let (patched, applied) = apply(&Patch::default(), "untouched", &config());
        assert_eq!(patched, "untouched");
        assert!(applied.is_empty());
    }

    #[test]
    fn test_apply_to_drifted_text() {
        let patch = diff("Hello\nWorld", "Hello\nPlanet", &config());
        let (patched, applied) = apply(&patch, "Hello there\nWorld", &config());
        assert_eq!(patched, "Hello there\nPlanet");
        assert_eq!(applied, vec![true]);
    }

    #[test]
    fn test_apply_keeps_unrelated_local_edits() {
        let base = "# Notes\n\nFirst paragraph.\n\nSecond paragraph.\n";
        let external = "# Notes\n\nFirst paragraph.\n\nSecond paragraph, revised.\n";
        let local = "# Notes\n\nFirst paragraph, with a local edit.\n\nSecond paragraph.\n";

        let patch = diff(base, external, &config());
        let (merged, applied) = apply(&patch, local, &config());
        assert_eq!(
            merged,
            "# Notes\n\nFirst paragraph, with a local edit.\n\nSecond paragraph, revised.\n"
        );
        assert_eq!(applied, vec![true]);
    }

    #[test]
    fn test_apply_skips_hunk_whose_context_is_gone() {
        let patch = diff("The cat sat on the mat.", "The cat sat on the hat.", &config());
        let text = "0123456789 0123456789 0123456789";
        let (patched, applied) = apply(&patch, text, &config());
        assert_eq!(patched, text);
        assert_eq!(applied, vec![false]);
    }

    #[test]
    fn test_apply_handles_multibyte_text() {
        let patch = diff("café ☕ time", "café 🍵 time", &config());
        let (patched, applied) = apply(&patch, "café ☕ time", &config());
        assert_eq!(patched, "café 🍵 time");
        assert_eq!(applied, vec![true]);
    }

    // ==================== Helpers ====================

    #[test]
    fn test_x_index() {
        // "abc" -> "1234xyz" style diff: delete "a", insert "1234", equal "xyz"
        let ops = vec![delete("a"), insert("1234"), equal("xyz")];
        assert_eq!(x_index(&ops, 2), 5);

        let ops = vec![equal("a"), delete("1234"), equal("xyz")];
        assert_eq!(x_index(&ops, 3), 1);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein(&[delete("abc"), insert("1234"), equal("xyz")]), 4);
        assert_eq!(levenshtein(&[equal("xyz"), delete("abc"), insert("1234")]), 4);
        assert_eq!(levenshtein(&[delete("abc"), equal("xyz"), insert("1234")]), 7);
    }

    #[test]
    fn test_find_and_rfind() {
        let hay: Vec<char> = "abcabc".chars().collect();
        let needle: Vec<char> = "bc".chars().collect();
        assert_eq!(find_chars(&hay, &needle, 0), Some(1));
        assert_eq!(find_chars(&hay, &needle, 2), Some(4));
        assert_eq!(rfind_chars(&hay, &needle, 6), Some(4));
        assert_eq!(rfind_chars(&hay, &needle, 3), Some(1));
        assert_eq!(find_chars(&hay, &[], 3), Some(3));
    }
}
