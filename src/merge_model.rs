//! Shared pair-merge training and encoding core for the BPE and BBPE engines.
//!
//! Byte-level BPE is, per its own definition, "structurally identical to BPE
//! operating on the byte alphabet" — so both engines funnel through the same
//! merge-counting trainer and the same rank-priority encoder here, and differ
//! only in how they produce their initial one-symbol-per-character sequences
//! and seed vocabulary (plain characters for `bpe`, byte-codec characters for
//! `bbpe`).

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::vocab::Vocabulary;
use crate::{Error, TokenId};

/// One entry of the ordered merge list: `left + right` was added to the
/// vocabulary at the position this rule occupies in the list.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub(crate) struct MergeRule {
    pub left: String,
    pub right: String,
}

/// Candidate considered during one round of training: the pair with the
/// highest count wins; ties are broken lexicographically by `left` then
/// `right`, ascending (the smaller pair sorts as higher priority).
#[derive(Debug, Eq, PartialEq)]
struct PairCandidate {
    count: u64,
    left: String,
    right: String,
}

impl Ord for PairCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.count
            .cmp(&other.count)
            .then_with(|| other.left.cmp(&self.left))
            .then_with(|| other.right.cmp(&self.right))
    }
}

impl PartialOrd for PairCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs the merge-learning loop described for BPE/BBPE training: repeatedly
/// find the highest-count adjacent pair across all weighted symbol
/// sequences, add its concatenation to `vocab`, and fold every
/// non-overlapping occurrence of it back into the sequences, until
/// `vocab.size()` reaches `target_vocab_size` or no mergeable pair remains.
///
/// `sequences` holds one entry per distinct pre-token: its symbol
/// decomposition and the frequency it occurred with in the corpus. It is
/// mutated in place as merges are folded in, and a single scratch buffer is
/// reused across every sequence in every round to keep the hot loop from
/// reallocating per pre-token.
pub(crate) fn train(
    sequences: &mut [(Vec<String>, u64)],
    vocab: &mut Vocabulary,
    target_vocab_size: usize,
) -> Vec<MergeRule> {
    let mut merges = Vec::new();
    let mut scratch: Vec<String> = Vec::new();

    while vocab.size() < target_vocab_size {
        let mut pair_counts: HashMap<(String, String), u64> = HashMap::new();
        for (seq, freq) in sequences.iter() {
            for w in seq.windows(2) {
                *pair_counts.entry((w[0].clone(), w[1].clone())).or_insert(0) += freq;
            }
        }

        let best = pair_counts
            .into_iter()
            .map(|((left, right), count)| PairCandidate { count, left, right })
            .max();

        let Some(best) = best else { break };
        if best.count == 0 {
            break;
        }

        let merged = format!("{}{}", best.left, best.right);
        vocab.add(&merged);

        for (seq, _freq) in sequences.iter_mut() {
            fold_merge(seq, &best.left, &best.right, &merged, &mut scratch);
        }

        merges.push(MergeRule {
            left: best.left,
            right: best.right,
        });
    }

    merges
}

/// Replaces every non-overlapping left-to-right occurrence of `(left,
/// right)` in `seq` with `merged`, using `scratch` as reusable working
/// storage.
fn fold_merge(seq: &mut Vec<String>, left: &str, right: &str, merged: &str, scratch: &mut Vec<String>) {
    if seq.len() < 2 {
        return;
    }
    scratch.clear();
    let mut i = 0;
    while i < seq.len() {
        if i + 1 < seq.len() && seq[i] == left && seq[i + 1] == right {
            scratch.push(merged.to_string());
            i += 2;
        } else {
            scratch.push(std::mem::take(&mut seq[i]));
            i += 1;
        }
    }
    std::mem::swap(seq, scratch);
}

/// Builds the `(left, right) -> priority rank` lookup from an ordered merge
/// list; lower rank applies first, matching the list's insertion order.
pub(crate) fn merge_ranks(merges: &[MergeRule]) -> HashMap<(String, String), usize> {
    merges
        .iter()
        .enumerate()
        .map(|(rank, rule)| ((rule.left.clone(), rule.right.clone()), rank))
        .collect()
}

/// A symbol during merge application: a run of one or more original
/// characters, linked to its neighbors so merges can splice in O(1).
#[derive(Debug, Clone)]
struct Symbol {
    start: usize,
    len: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct Bigram {
    left: usize,
    right: usize,
    rank: usize,
}

impl Ord for Bigram {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; lower rank must win, so reverse it.
        other.rank.cmp(&self.rank).then_with(|| other.left.cmp(&self.left))
    }
}

impl PartialOrd for Bigram {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Encodes `text` — already in the engine's symbol alphabet (plain
/// characters for BPE, byte-codec characters for BBPE) — by starting from
/// one symbol per character and repeatedly applying the highest-priority
/// applicable merge until none remain, then mapping the resulting symbols
/// to ids. A symbol with no vocabulary entry falls back to `unk_id` if
/// given, otherwise is reported as `Error::UnknownCharacter`.
pub(crate) fn encode_symbols(
    text: &str,
    vocab: &Vocabulary,
    ranks: &HashMap<(String, String), usize>,
    unk_id: Option<TokenId>,
) -> Result<Vec<TokenId>, Error> {
    let char_indices: Vec<(usize, char)> = text.char_indices().collect();
    if char_indices.is_empty() {
        return Ok(Vec::new());
    }

    let mut symbols: Vec<Symbol> = Vec::with_capacity(char_indices.len());
    for (i, &(byte_pos, _)) in char_indices.iter().enumerate() {
        let next_byte_pos = char_indices.get(i + 1).map_or(text.len(), |&(p, _)| p);
        symbols.push(Symbol {
            start: byte_pos,
            len: next_byte_pos - byte_pos,
            prev: i.checked_sub(1),
            next: (i + 1 < char_indices.len()).then_some(i + 1),
        });
    }

    fn symbol_text<'a>(text: &'a str, s: &Symbol) -> &'a str {
        &text[s.start..s.start + s.len]
    }

    fn try_add(
        text: &str,
        left: usize,
        right: usize,
        symbols: &[Symbol],
        ranks: &HashMap<(String, String), usize>,
        heap: &mut BinaryHeap<Bigram>,
    ) {
        let key = (
            symbol_text(text, &symbols[left]).to_string(),
            symbol_text(text, &symbols[right]).to_string(),
        );
        if let Some(&rank) = ranks.get(&key) {
            heap.push(Bigram { left, right, rank });
        }
    }

    let mut heap: BinaryHeap<Bigram> = BinaryHeap::new();
    for i in 0..symbols.len().saturating_sub(1) {
        try_add(text, i, i + 1, &symbols, ranks, &mut heap);
    }

    while let Some(bigram) = heap.pop() {
        if symbols[bigram.left].len == 0
            || symbols[bigram.right].len == 0
            || symbols[bigram.left].next != Some(bigram.right)
        {
            continue;
        }
        let key = (
            symbol_text(text, &symbols[bigram.left]).to_string(),
            symbol_text(text, &symbols[bigram.right]).to_string(),
        );
        match ranks.get(&key) {
            Some(&rank) if rank == bigram.rank => {}
            _ => continue,
        }

        symbols[bigram.left].len += symbols[bigram.right].len;
        symbols[bigram.right].len = 0;
        symbols[bigram.left].next = symbols[bigram.right].next;
        if let Some(next) = symbols[bigram.left].next {
            symbols[next].prev = Some(bigram.left);
        }

        if let Some(prev) = symbols[bigram.left].prev {
            try_add(text, prev, bigram.left, &symbols, ranks, &mut heap);
        }
        if let Some(next) = symbols[bigram.left].next {
            try_add(text, bigram.left, next, &symbols, ranks, &mut heap);
        }
    }

    let mut out = Vec::with_capacity(symbols.len());
    for sym in &symbols {
        if sym.len == 0 {
            continue;
        }
        let piece = &text[sym.start..sym.start + sym.len];
        if let Some(id) = vocab.id_of(piece) {
            out.push(id);
        } else if let Some(unk) = unk_id {
            out.push(unk);
        } else {
            return Err(Error::UnknownCharacter(piece.chars().next().unwrap_or('\u{FFFD}')));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seqs(words: &[(&str, u64)]) -> Vec<(Vec<String>, u64)> {
        words
            .iter()
            .map(|(w, f)| (w.chars().map(|c| c.to_string()).collect(), *f))
            .collect()
    }

    #[test]
    fn trains_deterministic_merge_order() {
        // Pair counts on this corpus: (w,e)=13 is the unique round-1 max
        // (lower=2 + lowest=2 + newer=6 + newest=3); every other pair tops
        // out at 9, so the first merge is unambiguous. Round 2 is a 3-way
        // count-9 tie among (l,o), (n,e), (e,we) broken lexicographically in
        // favor of the smallest left operand ("e" < "l" < "n").
        let mut vocab = Vocabulary::new();
        for c in "lowernest".chars() {
            vocab.add(c.to_string());
        }
        let mut sequences = seqs(&[("low", 5), ("lower", 2), ("lowest", 2), ("newer", 6), ("newest", 3)]);
        let target = vocab.size() + 2;
        let merges = train(&mut sequences, &mut vocab, target);
        assert_eq!(merges[0], MergeRule { left: "w".into(), right: "e".into() });
        assert_eq!(merges[1], MergeRule { left: "e".into(), right: "we".into() });
    }

    #[test]
    fn encode_applies_merges_in_priority_order() {
        let mut vocab = Vocabulary::new();
        for c in "low".chars() {
            vocab.add(c.to_string());
        }
        vocab.add("lo");
        vocab.add("low");
        let merges = vec![
            MergeRule { left: "l".into(), right: "o".into() },
            MergeRule { left: "lo".into(), right: "w".into() },
        ];
        let ranks = merge_ranks(&merges);
        let ids = encode_symbols("low", &vocab, &ranks, None).unwrap();
        assert_eq!(ids, vec![vocab.id_of("low").unwrap()]);
    }
}
