//! Character-level Byte-Pair Encoding tokenizer.
//!
//! Learns merges over whitespace-delimited pre-tokens decomposed into single
//! characters, and replays the same merges in priority order at encode time.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::merge_model::{self, MergeRule};
use crate::persistence::{PersistedModel, PersistedPayload};
use crate::pretokenize;
use crate::vocab::Vocabulary;
use crate::{Error, TokenId};

/// Rejoins pre-tokens on decode; kept in the vocabulary as an ordinary
/// single-character token so `decode` can stay a plain concatenation.
const SPACE_TOKEN: &str = " ";

/// Character-level BPE tokenizer.
pub struct BpeTokenizer {
    vocab: Vocabulary,
    merges: Vec<MergeRule>,
    special_tokens: Vec<String>,
    dictionary_root: std::path::PathBuf,
}

impl Default for BpeTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl BpeTokenizer {
    pub fn new() -> Self {
        Self {
            vocab: Vocabulary::new(),
            merges: Vec::new(),
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
    /// vocabulary with its entries (see `seed_from_dictionary`). Additive and
    /// safe to call repeatedly with different files.
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

    /// Adds every non-empty, non-comment line of `lines` to the vocabulary
    /// as a standalone token. Safe to call repeatedly and cumulative.
    pub fn seed_from_dictionary<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in crate::dictionary::parse_entries(lines) {
            self.vocab.add(entry);
        }
    }

    /// Trains on `corpus` (an iterable of strings) toward `vocab_size`,
    /// reserving the lowest ids for `special_tokens` in order.
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
        vocab.add(SPACE_TOKEN);

        let mut pretoken_freqs: HashMap<String, u64> = HashMap::new();
        let mut seen_any = false;
        for line in corpus {
            let line = line.as_ref();
            for word in pretokenize::split_whitespace(line) {
                seen_any = true;
                *pretoken_freqs.entry(word.to_string()).or_insert(0) += 1;
                for ch in word.chars() {
                    vocab.add(ch.to_string());
                }
            }
        }

        if !seen_any {
            return Err(Error::EmptyCorpus);
        }

        let seed_size = vocab.size();
        if vocab_size < seed_size {
            return Err(Error::InvalidVocabSize {
                requested: vocab_size,
                minimum: seed_size,
            });
        }

        let mut sequences: Vec<(Vec<String>, u64)> = pretoken_freqs
            .into_iter()
            .map(|(word, freq)| (word.chars().map(|c| c.to_string()).collect(), freq))
            .collect();

        let merges = merge_model::train(&mut sequences, &mut vocab, vocab_size);

        self.vocab = vocab;
        self.merges = merges;
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

    /// Pre-tokens are joined in the output with the vocabulary's space
    /// token, so `decode` can reverse this with a bare concatenation
    /// (see `SPACE_TOKEN`). Leading, trailing, and repeated whitespace in
    /// `text` collapses to single separators, matching `decode`'s own
    /// single-space rejoin policy.
    pub fn encode(&self, text: &str) -> Result<Vec<TokenId>, Error> {
        let ranks = merge_model::merge_ranks(&self.merges);
        let unk_id = self.vocab.id_of("<unk>");
        let space_id = self.vocab.id_of(SPACE_TOKEN);
        let mut out = Vec::new();
        for (i, word) in pretokenize::split_whitespace(text).into_iter().enumerate() {
            if i > 0 {
                if let Some(id) = space_id {
                    out.push(id);
                }
            }
            let ids = merge_model::encode_symbols(word, &self.vocab, &ranks, unk_id)?;
            out.extend(ids);
        }
        crate::invariants::assert_encode_postconditions(&out, self.vocab.size());
        Ok(out)
    }

    pub fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<TokenId>>, Error> {
        texts.par_iter().map(|t| self.encode(t)).collect()
    }

    pub fn decode(&self, ids: &[TokenId]) -> Result<String, Error> {
        let mut pieces = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.vocab.token_of(id) {
                Some(tok) => pieces.push(tok),
                None => return Err(Error::UnknownToken(id)),
            }
        }
        Ok(pieces.join(""))
    }

    pub fn decode_batch(&self, batches: &[&[TokenId]]) -> Result<Vec<String>, Error> {
        batches.par_iter().map(|b| self.decode(b)).collect()
    }

    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Error> {
        PersistedModel::new(
            crate::Algorithm::Bpe,
            &self.vocab,
            &self.special_tokens,
            PersistedPayload::Bpe {
                merges: self.merges.clone(),
            },
        )
        .save(path)
    }

    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        let model = PersistedModel::load(path, crate::Algorithm::Bpe)?;
        let merges = match model.payload {
            PersistedPayload::Bpe { merges } => merges,
            _ => return Err(Error::CorruptedModel("payload does not match BPE algorithm".into())),
        };
        Ok(Self {
            vocab: model.vocab,
            merges,
            special_tokens: model.special_tokens,
            dictionary_root: crate::dictionary::DEFAULT_DICTIONARY_ROOT.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_corpus_fails() {
        let mut t = BpeTokenizer::new();
        let corpus: Vec<&str> = vec![];
        assert!(matches!(t.train(corpus, 500, &[] as &[&str]), Err(Error::EmptyCorpus)));
    }

    #[test]
    fn special_tokens_get_lowest_ids() {
        let mut t = BpeTokenizer::new();
        t.train(["low lower lowest"], 20, &["<pad>", "<unk>"]).unwrap();
        assert_eq!(t.token_to_id("<pad>"), Some(0));
        assert_eq!(t.token_to_id("<unk>"), Some(1));
    }

    #[test]
    fn vocab_never_exceeds_target() {
        let mut t = BpeTokenizer::new();
        t.train(
            ["low lower lowest newer newest low low low low newer newer newer newer newer newer"],
            14,
            &[] as &[&str],
        )
        .unwrap();
        assert!(t.vocab_size() <= 14);
    }

    #[test]
    fn decode_of_unknown_id_fails() {
        let mut t = BpeTokenizer::new();
        t.train(["abc"], 10, &[] as &[&str]).unwrap();
        assert!(matches!(t.decode(&[9_999]), Err(Error::UnknownToken(9_999))));
    }

    #[test]
    fn decode_rejoins_pretokens_with_single_space() {
        let mut t = BpeTokenizer::new();
        t.train(["low lower lowest", "the lowest of the low"], 30, &[] as &[&str])
            .unwrap();
        let ids = t.encode("the low lowest").unwrap();
        assert_eq!(t.decode(&ids).unwrap(), "the low lowest");
    }

    #[test]
    fn decode_collapses_repeated_and_surrounding_whitespace() {
        let mut t = BpeTokenizer::new();
        t.train(["low lower lowest"], 30, &[] as &[&str]).unwrap();
        let ids = t.encode("  low   lower  ").unwrap();
        assert_eq!(t.decode(&ids).unwrap(), "low lower");
    }

    #[test]
    fn encode_batch_matches_single_encode() {
        let mut t = BpeTokenizer::new();
        t.train(["low lower lowest newer newest"], 20, &[] as &[&str]).unwrap();
        let texts = ["low", "newest"];
        let batch = t.encode_batch(&texts).unwrap();
        for (i, text) in texts.iter().enumerate() {
            assert_eq!(batch[i], t.encode(text).unwrap());
        }
    }
}
