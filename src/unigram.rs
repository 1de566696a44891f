//! Unigram Language Model tokenizer: EM-trained piece scores with Viterbi
//! segmentation at encode time.
//!
//! The trie-based prefix matching and Viterbi DP follow the teacher's UGM
//! session (`NaiveTrie` + `Best` backtracking table); the EM training loop
//! (seed candidate enumeration, forward-backward E-step, digamma-free M-step,
//! bottom-fraction pruning) follows the reference Unigram trainer's shape,
//! adapted to plain substring candidate enumeration since this crate does not
//! carry a suffix-array dependency.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::persistence::{PersistedModel, PersistedPayload};
use crate::pretokenize;
use crate::vocab::Vocabulary;
use crate::{Error, TokenId, TrainOptions};

const UNKNOWN_SCORE_PENALTY: f64 = 10.0;
const SPACE_TOKEN: &str = " ";

/// Byte-level trie for piece prefix matching, shared by encode and the
/// training E-step.
#[derive(Clone, Default)]
struct TrieNode {
    next: HashMap<u8, usize>,
    value: Option<TokenId>,
}

#[derive(Clone)]
struct Trie {
    nodes: Vec<TrieNode>,
}

impl Trie {
    fn new() -> Self {
        Self { nodes: vec![TrieNode::default()] }
    }

    fn insert(&mut self, s: &str, id: TokenId) {
        let mut cur = 0usize;
        for &b in s.as_bytes() {
            cur = match self.nodes[cur].next.get(&b).copied() {
                Some(n) => n,
                None => {
                    let new_idx = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[cur].next.insert(b, new_idx);
                    new_idx
                }
            };
        }
        self.nodes[cur].value = Some(id);
    }

    fn from_vocab(vocab: &Vocabulary) -> Self {
        let mut trie = Self::new();
        for (id, token) in vocab.iter() {
            trie.insert(token, id);
        }
        trie
    }

    fn traverse(&self, node: usize, b: u8) -> Option<usize> {
        self.nodes[node].next.get(&b).copied()
    }

    fn value(&self, node: usize) -> Option<TokenId> {
        self.nodes[node].value
    }

    /// Calls `visit(end_byte_offset, token_id)` for every vocabulary entry
    /// that matches a prefix of `text[start..]`.
    fn for_each_match(&self, text: &str, start: usize, mut visit: impl FnMut(usize, TokenId)) {
        let bytes = text.as_bytes();
        let mut node = 0usize;
        let mut pos = start;
        while pos < bytes.len() {
            match self.traverse(node, bytes[pos]) {
                Some(next) => {
                    node = next;
                    pos += 1;
                    if let Some(id) = self.value(node) {
                        visit(pos, id);
                    }
                }
                None => break,
            }
        }
    }
}

fn logsumexp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let m = a.max(b);
    m + ((a - m).exp() + (b - m).exp()).ln()
}

/// Unigram Language Model tokenizer.
pub struct UnigramTokenizer {
    vocab: Vocabulary,
    scores: Vec<f64>,
    special_tokens: Vec<String>,
    trie: Trie,
    dictionary_root: std::path::PathBuf,
}

impl Default for UnigramTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl UnigramTokenizer {
    pub fn new() -> Self {
        Self {
            vocab: Vocabulary::new(),
            scores: Vec::new(),
            special_tokens: Vec::new(),
            trie: Trie::new(),
            dictionary_root: crate::dictionary::DEFAULT_DICTIONARY_ROOT.into(),
        }
    }

    /// Changes the directory `load_vocab_from_dict` resolves file names
    /// against; defaults to `./dict`.
    pub fn set_dictionary_root(&mut self, root: impl Into<std::path::PathBuf>) {
        self.dictionary_root = root.into();
    }

    /// Reads `name` from the configured dictionary root and seeds the
    /// vocabulary with its entries (see `seed_from_dictionary`).
    pub fn load_vocab_from_dict(&mut self, name: &str) -> Result<(), Error> {
        let entries = crate::dictionary::read_dictionary_file(&self.dictionary_root, name)?;
        self.seed_from_dictionary(entries);
        Ok(())
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.size()
    }

    pub fn id_to_token(&self, id: TokenId) -> Option<&str> {
        self.vocab.token_of(id)
    }

    pub fn token_to_id(&self, token: &str) -> Option<TokenId> {
        self.vocab.id_of(token)
    }

    /// Log-probability of `id`'s piece, if present.
    pub fn get_score(&self, id: TokenId) -> Option<f64> {
        self.scores.get(id as usize).copied()
    }

    pub fn seed_from_dictionary<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in crate::dictionary::parse_entries(lines) {
            if self.vocab.contains(&entry) {
                continue;
            }
            self.vocab.add(entry);
            self.scores.push(f64::NEG_INFINITY);
        }
        self.trie = Trie::from_vocab(&self.vocab);
    }

    /// Trains toward `options.vocab_size`, reserving the lowest ids for
    /// `options.special_tokens`. See `TrainOptions` for the EM tuning knobs
    /// (`max_piece_length`, `inner_em_iterations`, `prune_fraction`,
    /// `seed_cap`).
    pub fn train<I, S>(&mut self, corpus: I, options: &TrainOptions) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut word_freqs: HashMap<String, u64> = HashMap::new();
        for line in corpus {
            for word in pretokenize::split_whitespace(line.as_ref()) {
                *word_freqs.entry(word.to_string()).or_insert(0) += 1;
            }
        }
        if word_freqs.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        let mut required_chars: HashSet<String> = word_freqs
            .keys()
            .flat_map(|w| w.chars())
            .map(|c| c.to_string())
            .collect();
        // The space token is mandatory infrastructure, not a corpus piece:
        // encode() joins whitespace-split words with it so decode() can stay
        // a plain concatenation (mirrors the bpe engine's SPACE_TOKEN).
        required_chars.insert(SPACE_TOKEN.to_string());

        let minimum = options.special_tokens.len() + required_chars.len();
        if options.vocab_size < minimum {
            return Err(Error::InvalidVocabSize {
                requested: options.vocab_size,
                minimum,
            });
        }

        let mut candidate_freqs: HashMap<String, u64> = HashMap::new();
        for (word, freq) in &word_freqs {
            let chars: Vec<char> = word.chars().collect();
            for start in 0..chars.len() {
                let max_len = options.max_piece_length.min(chars.len() - start);
                for len in 1..=max_len {
                    let piece: String = chars[start..start + len].iter().collect();
                    *candidate_freqs.entry(piece).or_insert(0) += freq;
                }
            }
        }
        for c in &required_chars {
            candidate_freqs.entry(c.clone()).or_insert(0);
        }

        let mut ranked: Vec<(String, u64)> = candidate_freqs.into_iter().collect();
        ranked.sort_by(|(sa, fa), (sb, fb)| {
            let score_a = *fa * sa.chars().count() as u64;
            let score_b = *fb * sb.chars().count() as u64;
            score_b.cmp(&score_a).then_with(|| sa.cmp(sb))
        });
        ranked.truncate(options.seed_cap.max(required_chars.len()));

        let mut pieces: Vec<(String, f64)> = Vec::with_capacity(ranked.len());
        let total_freq: f64 = ranked.iter().map(|(_, f)| (*f).max(1) as f64).sum();
        for (piece, freq) in ranked {
            let freq = (freq.max(1)) as f64;
            pieces.push((piece, (freq / total_freq).ln()));
        }

        let sentences: Vec<(String, u64)> = word_freqs.into_iter().collect();
        let desired_size = ((options.vocab_size as f64) * 1.1) as usize;

        loop {
            for _ in 0..options.inner_em_iterations {
                let expected = run_e_step(&pieces, &sentences);
                pieces = run_m_step(&pieces, &expected);
            }

            if pieces.len() <= desired_size.max(minimum) {
                break;
            }

            pieces = prune(&pieces, &sentences, &required_chars, options.prune_fraction, minimum);
        }

        let target_piece_count = options
            .vocab_size
            .saturating_sub(options.special_tokens.len())
            .max(required_chars.len());
        pieces = shrink_to_exact(&pieces, &sentences, &required_chars, target_piece_count);
        for c in &required_chars {
            if !pieces.iter().any(|(p, _)| p == c) {
                pieces.push((c.clone(), f64::NEG_INFINITY));
            }
        }

        // Final renormalization over the exact kept set, so every entry's
        // `exp(score)` sums to 1 for the vocabulary actually being shipped
        // (mid-training M-steps drop low-count pieces as they go, which
        // would otherwise leave the final set under-normalized).
        let expected = run_e_step(&pieces, &sentences);
        pieces = renormalize_keep_all(&pieces, &expected);

        let mut vocab = Vocabulary::new();
        let mut scores = Vec::with_capacity(options.vocab_size);
        for tok in &options.special_tokens {
            vocab.add(tok.clone());
            // Special tokens never occur as Viterbi segmentation pieces, so
            // they carry no probability mass: a zero score here would count
            // them as probability 1 each and break U1's "exp(score) over all
            // entries sums to 1" invariant (matches the NEG_INFINITY already
            // used for fresh dictionary-seeded entries in
            // `seed_from_dictionary`).
            scores.push(f64::NEG_INFINITY);
        }
        for (piece, score) in pieces {
            vocab.add(piece);
            scores.push(score);
        }

        self.trie = Trie::from_vocab(&vocab);
        self.vocab = vocab;
        self.scores = scores;
        self.special_tokens = options.special_tokens.clone();
        Ok(())
    }

    pub fn train_from_files<P: AsRef<std::path::Path>>(
        &mut self,
        paths: &[P],
        options: &TrainOptions,
    ) -> Result<(), Error> {
        let mut lines = Vec::new();
        for path in paths {
            let content = std::fs::read_to_string(path)?;
            lines.extend(content.lines().map(str::to_string).collect::<Vec<_>>());
        }
        self.train(lines, options)
    }

    /// Viterbi segmentation: `best[j]` holds the highest-scoring path
    /// reaching byte offset `j`, breaking ties toward the longer piece, then
    /// the earlier id (checked via `>` against the running best so an
    /// equal-score later candidate never displaces it).
    pub fn encode(&self, text: &str) -> Result<Vec<TokenId>, Error> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let unk_id = self.vocab.id_of("<unk>");
        let n = text.len();

        #[derive(Clone, Copy)]
        struct Best {
            token: TokenId,
            start: usize,
            score: f64,
        }

        let mut best = vec![Best { token: 0, start: 0, score: f64::NEG_INFINITY }; n + 1];
        best[0] = Best { token: 0, start: 0, score: 0.0 };

        // Special-token and zero-mass dictionary-seeded entries carry
        // `NEG_INFINITY` and are never real Viterbi candidates; folding them
        // in would make `min_score` always `-inf` whenever any are present,
        // collapsing `unknown_score` to the bare constant below regardless
        // of the trained pieces' actual score range.
        let min_score = self
            .scores
            .iter()
            .cloned()
            .filter(|s| s.is_finite())
            .fold(f64::INFINITY, f64::min);
        let unknown_score = if min_score.is_finite() {
            min_score - UNKNOWN_SCORE_PENALTY
        } else {
            -UNKNOWN_SCORE_PENALTY
        };

        let char_starts: Vec<usize> = text.char_indices().map(|(i, _)| i).chain([n]).collect();

        for (idx, &start) in char_starts.iter().enumerate() {
            if start >= n {
                break;
            }
            let current = best[start];
            if current.score == f64::NEG_INFINITY {
                continue;
            }
            let next_char_end = char_starts[idx + 1];
            let mut covered_single_char = false;

            self.trie.for_each_match(text, start, |end, id| {
                if end == next_char_end {
                    covered_single_char = true;
                }
                let piece_score = self.scores.get(id as usize).copied().unwrap_or(unknown_score);
                let candidate = current.score + piece_score;
                if candidate > best[end].score {
                    best[end] = Best { token: id, start, score: candidate };
                }
            });

            if !covered_single_char {
                if let Some(unk) = unk_id {
                    let candidate = current.score + unknown_score;
                    if candidate > best[next_char_end].score {
                        best[next_char_end] = Best { token: unk, start, score: candidate };
                    }
                }
            }
        }

        if best[n].score == f64::NEG_INFINITY {
            return match unk_id {
                Some(unk) => Ok(vec![unk]),
                None => Err(Error::UnknownCharacter(text.chars().next().unwrap_or('\u{FFFD}'))),
            };
        }

        let mut out_rev = Vec::new();
        let mut pos = n;
        while pos > 0 {
            let b = best[pos];
            out_rev.push(b.token);
            pos = b.start;
        }
        out_rev.reverse();
        crate::invariants::assert_encode_postconditions(&out_rev, self.vocab.size());
        Ok(out_rev)
    }

    pub fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<TokenId>>, Error> {
        texts.par_iter().map(|t| self.encode(t)).collect()
    }

    /// Concatenates piece strings in id order; pre-tokens were joined with a
    /// single space at encode time (see `bpe`'s decode for the same policy).
    pub fn decode(&self, ids: &[TokenId]) -> Result<String, Error> {
        let mut out = String::new();
        for &id in ids {
            match self.vocab.token_of(id) {
                Some(tok) => out.push_str(tok),
                None => return Err(Error::UnknownToken(id)),
            }
        }
        Ok(out)
    }

    pub fn decode_batch(&self, batches: &[&[TokenId]]) -> Result<Vec<String>, Error> {
        batches.par_iter().map(|b| self.decode(b)).collect()
    }

    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Error> {
        PersistedModel::new(
            crate::Algorithm::Unigram,
            &self.vocab,
            &self.special_tokens,
            PersistedPayload::Unigram {
                score_bits: self.scores.iter().map(|s| s.to_bits()).collect(),
            },
        )
        .save(path)
    }

    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        let model = PersistedModel::load(path, crate::Algorithm::Unigram)?;
        let scores = match model.payload {
            PersistedPayload::Unigram { score_bits } => {
                score_bits.into_iter().map(f64::from_bits).collect()
            }
            _ => return Err(Error::CorruptedModel("payload does not match Unigram algorithm".into())),
        };
        Ok(Self {
            trie: Trie::from_vocab(&model.vocab),
            vocab: model.vocab,
            scores,
            special_tokens: model.special_tokens,
            dictionary_root: crate::dictionary::DEFAULT_DICTIONARY_ROOT.into(),
        })
    }
}

/// Forward-backward E-step: returns the expected count of every piece,
/// summed (weighted by sentence frequency) across all training sentences.
fn run_e_step(pieces: &[(String, f64)], sentences: &[(String, u64)]) -> Vec<f64> {
    let mut trie = Trie::new();
    for (i, (piece, _)) in pieces.iter().enumerate() {
        trie.insert(piece, i as TokenId);
    }

    let mut expected = vec![0.0f64; pieces.len()];
    for (sentence, freq) in sentences {
        let n = sentence.len();
        if n == 0 {
            continue;
        }
        let mut alpha = vec![f64::NEG_INFINITY; n + 1];
        alpha[0] = 0.0;
        let mut edges_from: Vec<Vec<(usize, usize)>> = vec![Vec::new(); n + 1];
        for start in 0..n {
            trie.for_each_match(sentence, start, |end, id| {
                edges_from[start].push((end, id as usize));
            });
        }
        for start in 0..n {
            if alpha[start] == f64::NEG_INFINITY {
                continue;
            }
            for &(end, piece_idx) in &edges_from[start] {
                let score = pieces[piece_idx].1;
                alpha[end] = logsumexp(alpha[end], alpha[start] + score);
            }
        }

        let mut beta = vec![f64::NEG_INFINITY; n + 1];
        beta[n] = 0.0;
        for start in (0..n).rev() {
            for &(end, piece_idx) in &edges_from[start] {
                let score = pieces[piece_idx].1;
                beta[start] = logsumexp(beta[start], score + beta[end]);
            }
        }

        let z = alpha[n];
        if !z.is_finite() {
            continue;
        }
        for start in 0..n {
            for &(end, piece_idx) in &edges_from[start] {
                let score = pieces[piece_idx].1;
                let posterior = (alpha[start] + score + beta[end] - z).exp();
                expected[piece_idx] += posterior * (*freq as f64);
            }
        }
    }

    expected
}

/// M-step: renormalizes into log-probabilities, dropping pieces whose
/// expected count fell under the floor (they contribute negligibly and
/// would otherwise destabilize the log).
fn run_m_step(pieces: &[(String, f64)], expected: &[f64]) -> Vec<(String, f64)> {
    const FREQUENCY_FLOOR: f64 = 0.5;
    let mut kept: Vec<(String, f64)> = Vec::with_capacity(pieces.len());
    let mut sum = 0.0;
    for ((piece, _), &count) in pieces.iter().zip(expected) {
        if count < FREQUENCY_FLOOR {
            continue;
        }
        kept.push((piece.clone(), count));
        sum += count;
    }
    if sum <= 0.0 {
        return pieces.to_vec();
    }
    kept.into_iter().map(|(p, c)| (p, (c / sum).ln())).collect()
}

/// Drops the bottom `prune_fraction` of non-mandatory pieces by expected
/// count (an approximation of loss-delta: pieces with the least expected
/// usage cost the least log-likelihood to remove), re-running an E-step
/// first to get fresh counts to rank by. Single-codepoint pieces and
/// pieces below `floor_size` entries never get dropped.
fn prune(
    pieces: &[(String, f64)],
    sentences: &[(String, u64)],
    required_chars: &HashSet<String>,
    prune_fraction: f64,
    floor_size: usize,
) -> Vec<(String, f64)> {
    let expected = run_e_step(pieces, sentences);
    let mut removable: Vec<(usize, f64)> = pieces
        .iter()
        .enumerate()
        .filter(|(_, (p, _))| !required_chars.contains(p))
        .map(|(i, _)| (i, expected[i]))
        .collect();
    removable.sort_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let max_droppable = pieces.len().saturating_sub(floor_size);
    let drop_count = ((removable.len() as f64) * prune_fraction).floor() as usize;
    let drop_count = drop_count.min(removable.len()).min(max_droppable);

    let drop_set: HashSet<usize> = removable.into_iter().take(drop_count).map(|(i, _)| i).collect();
    pieces
        .iter()
        .enumerate()
        .filter(|(i, _)| !drop_set.contains(i))
        .map(|(_, p)| p.clone())
        .collect()
}

/// Drops the lowest-expected-count non-mandatory pieces until exactly
/// `target` remain (or fewer candidates exist than `target`, in which case
/// nothing is dropped). Used once, after the coarse pruning loop, to land on
/// the exact vocabulary size instead of the loop's `desired_size` overshoot.
fn shrink_to_exact(
    pieces: &[(String, f64)],
    sentences: &[(String, u64)],
    required_chars: &HashSet<String>,
    target: usize,
) -> Vec<(String, f64)> {
    let mut pieces = pieces.to_vec();
    if pieces.len() <= target {
        return pieces;
    }
    let expected = run_e_step(&pieces, sentences);
    let mut removable: Vec<(usize, f64)> = pieces
        .iter()
        .enumerate()
        .filter(|(_, (p, _))| !required_chars.contains(p))
        .map(|(i, _)| (i, expected[i]))
        .collect();
    removable.sort_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let to_remove = removable.len().min(pieces.len().saturating_sub(target));
    let drop_set: HashSet<usize> = removable.into_iter().take(to_remove).map(|(i, _)| i).collect();
    pieces = pieces
        .iter()
        .enumerate()
        .filter(|(i, _)| !drop_set.contains(i))
        .map(|(_, p)| p.clone())
        .collect();
    pieces
}

/// Renormalizes every piece's score into a log-probability over `pieces`
/// without dropping any entry (unlike `run_m_step`'s floor-drop, used during
/// training); a small floor keeps pieces with zero expected usage (e.g.
/// dictionary-seeded entries never hit by training sentences) from producing
/// `ln(0)`.
fn renormalize_keep_all(pieces: &[(String, f64)], expected: &[f64]) -> Vec<(String, f64)> {
    const FLOOR: f64 = 1e-6;
    let adjusted: Vec<f64> = expected.iter().map(|&e| e.max(FLOOR)).collect();
    let sum: f64 = adjusted.iter().sum();
    pieces
        .iter()
        .zip(adjusted.iter())
        .map(|((p, _), &e)| (p.clone(), (e / sum).ln()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // A special token's score is NEG_INFINITY, which serde_json would
    // otherwise round-trip as JSON `null` and then fail to deserialize back
    // into an `f64`; `save`/`load` must survive this exactly.
    #[test]
    fn save_and_load_round_trips_a_special_tokens_infinite_score() {
        let mut t = UnigramTokenizer::new();
        let options = TrainOptions {
            vocab_size: 30,
            special_tokens: vec!["<unk>".to_string()],
            ..TrainOptions::default()
        };
        t.train(["low lower lowest newer newest"], &options).unwrap();
        assert_eq!(t.get_score(0), Some(f64::NEG_INFINITY));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unigram.json");
        t.save(&path).unwrap();
        let loaded = UnigramTokenizer::load(&path).unwrap();

        assert_eq!(loaded.get_score(0), Some(f64::NEG_INFINITY));
        assert_eq!(loaded.encode("newest").unwrap(), t.encode("newest").unwrap());
    }

    #[test]
    fn trains_and_respects_vocab_size_cap() {
        let mut t = UnigramTokenizer::new();
        let options = TrainOptions {
            vocab_size: 40,
            special_tokens: vec!["<unk>".to_string()],
            ..TrainOptions::default()
        };
        t.train(["low lower lowest newer newest low low low low newer newer"], &options)
            .unwrap();
        assert!(t.vocab_size() <= 40);
        assert_eq!(t.token_to_id("<unk>"), Some(0));
    }

    #[test]
    fn scores_sum_to_one_after_training() {
        let mut t = UnigramTokenizer::new();
        let options = TrainOptions { vocab_size: 30, ..TrainOptions::default() };
        t.train(["low lower lowest newer newest"], &options).unwrap();
        let sum: f64 = t.scores.iter().map(|s| s.exp()).sum();
        assert!((sum - 1.0).abs() < 1e-3, "sum was {sum}");
    }

    #[test]
    fn encode_segmentation_concatenates_back_to_input() {
        let mut t = UnigramTokenizer::new();
        let options = TrainOptions {
            vocab_size: 24,
            special_tokens: vec!["<unk>".to_string()],
            ..TrainOptions::default()
        };
        t.train(["newest newer lowest"], &options).unwrap();
        let ids = t.encode("newest").unwrap();
        let decoded = t.decode(&ids).unwrap();
        assert_eq!(decoded, "newest");
    }

    #[test]
    fn empty_corpus_fails() {
        let mut t = UnigramTokenizer::new();
        let corpus: Vec<&str> = vec![];
        assert!(matches!(t.train(corpus, &TrainOptions::default()), Err(Error::EmptyCorpus)));
    }

    // U2: dropping the highest-scoring multi-character piece from the
    // vocabulary and re-encoding a sentence that used it never yields fewer
    // tokens than before — the best alternative segmentation can only be
    // equally or less efficient, never more.
    #[test]
    fn u2_removing_best_piece_never_shortens_a_segmentation() {
        let mut t = UnigramTokenizer::new();
        let options = TrainOptions { vocab_size: 24, ..TrainOptions::default() };
        t.train(["newest newer lowest low lower newest newer"], &options).unwrap();

        let before = t.encode("newest").unwrap();

        let best_multichar = (0..t.vocab.size() as TokenId)
            .filter(|&id| t.vocab.token_of(id).map_or(false, |tok| tok.chars().count() > 1))
            .max_by(|&a, &b| t.scores[a as usize].partial_cmp(&t.scores[b as usize]).unwrap())
            .expect("a trained multi-character piece must exist");

        let mut vocab = Vocabulary::new();
        let mut scores = Vec::new();
        for (id, token) in t.vocab.iter() {
            if id == best_multichar {
                continue;
            }
            vocab.add(token);
            scores.push(t.scores[id as usize]);
        }
        let pruned = UnigramTokenizer {
            trie: Trie::from_vocab(&vocab),
            vocab,
            scores,
            special_tokens: t.special_tokens.clone(),
            dictionary_root: t.dictionary_root.clone(),
        };

        let after = pruned.encode("newest").unwrap();
        assert!(
            after.len() >= before.len(),
            "removing the best piece should never shorten the segmentation: before {before:?}, after {after:?}"
        );
    }
}
