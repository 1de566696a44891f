//! WordPiece tokenizer: `##`-continuation-marker pieces, trained by
//! likelihood-ratio greedy pair merging and encoded by greedy longest match.
//!
//! The greedy longest-match scan (decreasing end position until a vocabulary
//! hit) follows the teacher's WPM session (`wpm.rs`); this engine differs
//! from the teacher's phantom-space (`▁`) convention by using the explicit
//! `##` continuation marker and a from-scratch training loop, since the
//! teacher's WPM was inference-only.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::persistence::{PersistedModel, PersistedPayload};
use crate::pretokenize;
use crate::vocab::Vocabulary;
use crate::{Error, TokenId};

fn strip_marker(s: &str) -> &str {
    s.strip_prefix("##").unwrap_or(s)
}

/// WordPiece tokenizer.
pub struct WordPieceTokenizer {
    vocab: Vocabulary,
    special_tokens: Vec<String>,
    dictionary_root: std::path::PathBuf,
}

impl Default for WordPieceTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl WordPieceTokenizer {
    pub fn new() -> Self {
        Self {
            vocab: Vocabulary::new(),
            special_tokens: Vec::new(),
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

    /// Inserts each dictionary entry as an initial piece, auto-creating the
    /// matching single-character continuation forms it depends on.
    pub fn seed_from_dictionary<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in crate::dictionary::parse_entries(lines) {
            self.vocab.add(entry.clone());
            for ch in entry.chars() {
                self.vocab.add(format!("##{ch}"));
            }
        }
    }

    pub fn train<I, S>(
        &mut self,
        corpus: I,
        vocab_size: usize,
        special_tokens: &[S],
    ) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Vocabulary::new();
        let specials: Vec<String> = special_tokens.iter().map(|s| s.as_ref().to_string()).collect();
        for tok in &specials {
            vocab.add(tok.clone());
        }

        let mut word_freqs: HashMap<String, u64> = HashMap::new();
        let mut chars: std::collections::HashSet<char> = std::collections::HashSet::new();
        for line in corpus {
            let line = line.as_ref();
            for word in pretokenize::split_whitespace(line) {
                *word_freqs.entry(word.to_string()).or_insert(0) += 1;
                chars.extend(word.chars());
            }
        }
        if word_freqs.is_empty() {
            return Err(Error::EmptyCorpus);
        }

        for c in &chars {
            vocab.add(c.to_string());
            vocab.add(format!("##{c}"));
        }

        let minimum = vocab.size();
        if vocab_size < minimum {
            return Err(Error::InvalidVocabSize { requested: vocab_size, minimum });
        }

        let mut sequences: Vec<(Vec<String>, u64)> = word_freqs
            .into_iter()
            .map(|(word, freq)| {
                let seq: Vec<String> = word
                    .chars()
                    .enumerate()
                    .map(|(i, c)| if i == 0 { c.to_string() } else { format!("##{c}") })
                    .collect();
                (seq, freq)
            })
            .collect();

        let mut scratch: Vec<String> = Vec::new();
        while vocab.size() < vocab_size {
            let mut symbol_freq: HashMap<String, u64> = HashMap::new();
            let mut pair_freq: HashMap<(String, String), u64> = HashMap::new();
            for (seq, freq) in &sequences {
                for s in seq {
                    *symbol_freq.entry(s.clone()).or_insert(0) += freq;
                }
                for w in seq.windows(2) {
                    *pair_freq.entry((w[0].clone(), w[1].clone())).or_insert(0) += freq;
                }
            }

            let mut best: Option<(f64, String, String)> = None;
            for ((a, b), count) in pair_freq {
                if count == 0 {
                    continue;
                }
                let fa = *symbol_freq.get(&a).unwrap_or(&0) as f64;
                let fb = *symbol_freq.get(&b).unwrap_or(&0) as f64;
                if fa == 0.0 || fb == 0.0 {
                    continue;
                }
                let score = count as f64 / (fa * fb);
                if score <= 0.0 {
                    continue;
                }
                let better = match &best {
                    None => true,
                    Some((best_score, best_a, best_b)) => {
                        score > *best_score
                            || (score == *best_score && (&a, &b) < (best_a, best_b))
                    }
                };
                if better {
                    best = Some((score, a, b));
                }
            }

            let Some((_, a, b)) = best else { break };
            let merged = format!("{a}{}", strip_marker(&b));
            vocab.add(&merged);

            for (seq, _freq) in sequences.iter_mut() {
                fold_merge(seq, &a, &b, &merged, &mut scratch);
            }
        }

        self.vocab = vocab;
        self.special_tokens = specials;
        Ok(())
    }

    pub fn train_from_files<P: AsRef<std::path::Path>, S: AsRef<str>>(
        &mut self,
        paths: &[P],
        vocab_size: usize,
        special_tokens: &[S],
    ) -> Result<(), Error> {
        let mut lines = Vec::new();
        for path in paths {
            let content = std::fs::read_to_string(path)?;
            lines.extend(content.lines().map(str::to_string).collect::<Vec<_>>());
        }
        self.train(lines, vocab_size, special_tokens)
    }

    pub fn encode(&self, text: &str) -> Result<Vec<TokenId>, Error> {
        let unk_id = self.vocab.id_of("<unk>");
        let mut out = Vec::new();
        for word in pretokenize::split_whitespace(text) {
            match encode_word(word, &self.vocab) {
                Some(ids) => out.extend(ids),
                None => match unk_id {
                    Some(id) => out.push(id),
                    None => {
                        return Err(Error::UnknownCharacter(word.chars().next().unwrap_or('\u{FFFD}')))
                    }
                },
            }
        }
        crate::invariants::assert_encode_postconditions(&out, self.vocab.size());
        Ok(out)
    }

    pub fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<TokenId>>, Error> {
        texts.par_iter().map(|t| self.encode(t)).collect()
    }

    /// Concatenates piece strings, dropping the `##` marker, inserting a
    /// single space before every initial piece except the first.
    pub fn decode(&self, ids: &[TokenId]) -> Result<String, Error> {
        let mut out = String::new();
        for (i, &id) in ids.iter().enumerate() {
            let tok = match self.vocab.token_of(id) {
                Some(tok) => tok,
                None => return Err(Error::UnknownToken(id)),
            };
            if let Some(rest) = tok.strip_prefix("##") {
                out.push_str(rest);
            } else {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(tok);
            }
        }
        Ok(out)
    }

    pub fn decode_batch(&self, batches: &[&[TokenId]]) -> Result<Vec<String>, Error> {
        batches.par_iter().map(|b| self.decode(b)).collect()
    }

    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Error> {
        let continuation: Vec<bool> = self.vocab.iter().map(|(_, tok)| tok.starts_with("##")).collect();
        PersistedModel::new(
            crate::Algorithm::WordPiece,
            &self.vocab,
            &self.special_tokens,
            PersistedPayload::WordPiece { continuation },
        )
        .save(path)
    }

    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        let model = PersistedModel::load(path, crate::Algorithm::WordPiece)?;
        match model.payload {
            PersistedPayload::WordPiece { .. } => {}
            _ => return Err(Error::CorruptedModel("payload does not match WordPiece algorithm".into())),
        }
        Ok(Self {
            vocab: model.vocab,
            special_tokens: model.special_tokens,
            dictionary_root: crate::dictionary::DEFAULT_DICTIONARY_ROOT.into(),
        })
    }
}

/// Greedy longest match: the piece at word position 0 must be an initial
/// (unmarked) entry; every later piece must be a continuation (`##`) entry.
/// Returns `None` if any position has no matching prefix, signaling the
/// caller to fall back to a single `<unk>` for the whole word.
fn encode_word(word: &str, vocab: &Vocabulary) -> Option<Vec<TokenId>> {
    let chars: Vec<char> = word.chars().collect();
    let n = chars.len();
    if n == 0 {
        return Some(Vec::new());
    }
    let mut out = Vec::with_capacity(n);
    let mut pos = 0;
    while pos < n {
        let mut end = n;
        let mut found = None;
        while end > pos {
            let piece: String = chars[pos..end].iter().collect();
            let candidate = if pos == 0 { piece } else { format!("##{piece}") };
            if let Some(id) = vocab.id_of(&candidate) {
                found = Some((id, end));
                break;
            }
            end -= 1;
        }
        match found {
            Some((id, end)) => {
                out.push(id);
                pos = end;
            }
            None => return None,
        }
    }
    Some(out)
}

/// Replaces every non-overlapping left-to-right occurrence of `(left,
/// right)` in `seq` with `merged`.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_corpus_fails() {
        let mut t = WordPieceTokenizer::new();
        let corpus: Vec<&str> = vec![];
        assert!(matches!(t.train(corpus, 50, &[] as &[&str]), Err(Error::EmptyCorpus)));
    }

    #[test]
    fn seeds_initial_and_continuation_forms_per_character() {
        let mut t = WordPieceTokenizer::new();
        t.train(["ab ba"], 10, &[] as &[&str]).unwrap();
        assert!(t.token_to_id("a").is_some());
        assert!(t.token_to_id("##a").is_some());
        assert!(t.token_to_id("b").is_some());
        assert!(t.token_to_id("##b").is_some());
    }

    #[test]
    fn encode_then_decode_round_trips_a_known_word() {
        let mut t = WordPieceTokenizer::new();
        t.train(["playing played player plays"], 40, &["<unk>"]).unwrap();
        let ids = t.encode("playing").unwrap();
        assert_eq!(t.decode(&ids).unwrap(), "playing");
    }

    #[test]
    fn decode_inserts_space_between_words_but_not_continuations() {
        let mut t = WordPieceTokenizer::new();
        t.train(["playing played player plays"], 40, &["<unk>"]).unwrap();
        let ids = t.encode("played player").unwrap();
        assert_eq!(t.decode(&ids).unwrap(), "played player");
    }

    #[test]
    fn unknown_character_falls_back_to_unk() {
        let mut t = WordPieceTokenizer::new();
        t.train(["hello world"], 30, &["<unk>"]).unwrap();
        let ids = t.encode("hello \u{1F600}").unwrap();
        assert_eq!(*ids.last().unwrap(), t.token_to_id("<unk>").unwrap());
    }
}
