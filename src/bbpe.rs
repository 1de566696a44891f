//! Byte-level Byte-Pair Encoding tokenizer.
//!
//! Structurally identical to `bpe`: same merge-counting trainer, same
//! rank-priority encoder. The differences are the alphabet (the 256
//! byte-codec characters instead of corpus characters) and the
//! pre-tokenization unit (the whole input, not whitespace-delimited words —
//! see `byte_encoder` and the crate-level design notes on why this is what
//! makes the exact round-trip invariant hold).

use std::collections::HashMap;

use rayon::prelude::*;

use crate::byte_encoder::{decode_bytes, encode_bytes};
use crate::merge_model::{self, MergeRule};
use crate::persistence::{PersistedModel, PersistedPayload};
use crate::vocab::Vocabulary;
use crate::{Error, TokenId};

const BYTE_ALPHABET_SIZE: usize = 256;

pub struct BbpeTokenizer {
    vocab: Vocabulary,
    merges: Vec<MergeRule>,
    special_tokens: Vec<String>,
    dictionary_root: std::path::PathBuf,
}

impl Default for BbpeTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl BbpeTokenizer {
    /// A freshly constructed engine already holds the 256-entry byte
    /// vocabulary; it does not need training to be usable.
    pub fn new() -> Self {
        let mut vocab = Vocabulary::new();
        seed_byte_alphabet(&mut vocab);
        Self {
            vocab,
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

    pub fn seed_from_dictionary<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for entry in crate::dictionary::parse_entries(lines) {
            self.vocab.add(entry);
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
        seed_byte_alphabet(&mut vocab);

        let minimum = specials.len() + BYTE_ALPHABET_SIZE;
        if vocab_size < minimum {
            return Err(Error::InvalidVocabSize {
                requested: vocab_size,
                minimum,
            });
        }

        let mut chunk_freqs: HashMap<String, u64> = HashMap::new();
        let mut seen_any = false;
        for line in corpus {
            let line = line.as_ref();
            if line.is_empty() {
                continue;
            }
            seen_any = true;
            let encoded = encode_bytes(line);
            *chunk_freqs.entry(encoded).or_insert(0) += 1;
        }

        if !seen_any {
            return Err(Error::EmptyCorpus);
        }

        let mut sequences: Vec<(Vec<String>, u64)> = chunk_freqs
            .into_iter()
            .map(|(chunk, freq)| (chunk.chars().map(|c| c.to_string()).collect(), freq))
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

    pub fn encode(&self, text: &str) -> Result<Vec<TokenId>, Error> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let ranks = merge_model::merge_ranks(&self.merges);
        let encoded = encode_bytes(text);
        let ids = merge_model::encode_symbols(&encoded, &self.vocab, &ranks, None)?;
        crate::invariants::assert_encode_postconditions(&ids, self.vocab.size());
        Ok(ids)
    }

    pub fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<TokenId>>, Error> {
        texts.par_iter().map(|t| self.encode(t)).collect()
    }

    pub fn decode(&self, ids: &[TokenId]) -> Result<String, Error> {
        let mut encoded = String::new();
        for &id in ids {
            match self.vocab.token_of(id) {
                Some(tok) => encoded.push_str(tok),
                None => return Err(Error::UnknownToken(id)),
            }
        }
        Ok(decode_bytes(&encoded))
    }

    pub fn decode_batch(&self, batches: &[&[TokenId]]) -> Result<Vec<String>, Error> {
        batches.par_iter().map(|b| self.decode(b)).collect()
    }

    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Error> {
        PersistedModel::new(
            crate::Algorithm::Bbpe,
            &self.vocab,
            &self.special_tokens,
            PersistedPayload::Bbpe {
                merges: self.merges.clone(),
            },
        )
        .save(path)
    }

    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Error> {
        let model = PersistedModel::load(path, crate::Algorithm::Bbpe)?;
        let merges = match model.payload {
            PersistedPayload::Bbpe { merges } => merges,
            _ => return Err(Error::CorruptedModel("payload does not match BBPE algorithm".into())),
        };
        Ok(Self {
            vocab: model.vocab,
            merges,
            special_tokens: model.special_tokens,
            dictionary_root: crate::dictionary::DEFAULT_DICTIONARY_ROOT.into(),
        })
    }
}

fn seed_byte_alphabet(vocab: &mut Vocabulary) {
    let byte_encoder = crate::byte_encoder::bytes_to_unicode();
    for byte in 0u16..=255 {
        let ch = byte_encoder[&(byte as u8)];
        vocab.add(ch.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_engine_has_256_byte_tokens() {
        let t = BbpeTokenizer::new();
        assert_eq!(t.vocab_size(), 256);
    }

    #[test]
    fn vocab_size_below_256_plus_specials_fails() {
        let mut t = BbpeTokenizer::new();
        assert!(matches!(
            t.train(["test"], 100, &[] as &[&str]),
            Err(Error::InvalidVocabSize { .. })
        ));
    }

    #[test]
    fn exact_round_trip_for_unicode_and_whitespace() {
        let mut t = BbpeTokenizer::new();
        t.train(["héllo world", "héllo there", "  extra   spaces  "], 260, &[] as &[&str])
            .unwrap();
        for s in ["héllo world", "  extra   spaces  ", "emoji 🎉 too"] {
            let ids = t.encode(s).unwrap();
            assert_eq!(t.decode(&ids).unwrap(), s);
        }
    }

    #[test]
    fn empty_corpus_fails() {
        let mut t = BbpeTokenizer::new();
        let corpus: Vec<&str> = vec![];
        assert!(matches!(t.train(corpus, 300, &[] as &[&str]), Err(Error::EmptyCorpus)));
    }
}
