//! Self-describing save/load schema shared by all four engines.
//!
//! A persisted model is a single JSON document: a magic string and version
//! so mismatched algorithm types fail fast, the vocabulary, the special
//! token list, and an algorithm-specific payload (merge list, scores, or
//! continuation flags). `serde_json` gives every engine the same file
//! format for free instead of each hand-rolling a binary layout.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::merge_model::MergeRule;
use crate::vocab::Vocabulary;
use crate::{Algorithm, Error};

const MAGIC: &str = "zero-tokenizer";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) enum PersistedPayload {
    Bpe { merges: Vec<MergeRule> },
    Bbpe { merges: Vec<MergeRule> },
    /// Raw IEEE-754 bit patterns (`f64::to_bits`/`from_bits`), not plain
    /// floats: `serde_json` encodes non-finite floats (the `NEG_INFINITY`
    /// special-token/zero-mass sentinel `unigram` uses) as JSON `null`, which
    /// its own `f64` deserializer then rejects on load. Bit patterns are
    /// ordinary finite integers as far as JSON is concerned, so every score
    /// — finite or not — survives the round trip exactly.
    Unigram { score_bits: Vec<u64> },
    /// One flag per vocabulary entry in id order; `true` marks a
    /// continuation (`##`-prefixed) piece. Redundant with the `##` prefix
    /// already present in each token's stored string, but kept explicit
    /// because the persisted schema names it as algorithm-specific state,
    /// and it buys a cheap cross-check against `CorruptedModel` on load.
    WordPiece { continuation: Vec<bool> },
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PersistedModel {
    magic: String,
    version: u32,
    algorithm: Algorithm,
    pub(crate) vocab: Vocabulary,
    pub(crate) special_tokens: Vec<String>,
    pub(crate) payload: PersistedPayload,
}

impl PersistedModel {
    pub(crate) fn new(
        algorithm: Algorithm,
        vocab: &Vocabulary,
        special_tokens: &[String],
        payload: PersistedPayload,
    ) -> Self {
        Self {
            magic: MAGIC.to_string(),
            version: FORMAT_VERSION,
            algorithm,
            vocab: vocab.clone(),
            special_tokens: special_tokens.to_vec(),
            payload,
        }
    }

    pub(crate) fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let json = serde_json::to_string(self)
            .map_err(|e| Error::CorruptedModel(format!("failed to serialize model: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub(crate) fn load<P: AsRef<Path>>(path: P, expected: Algorithm) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let model: PersistedModel = serde_json::from_str(&contents)
            .map_err(|e| Error::CorruptedModel(format!("invalid model file: {e}")))?;

        if model.magic != MAGIC {
            return Err(Error::CorruptedModel(format!(
                "unrecognized magic value '{}'",
                model.magic
            )));
        }
        if model.algorithm != expected {
            return Err(Error::AlgorithmMismatch {
                expected,
                found: model.algorithm,
            });
        }
        if !model.vocab.is_internally_consistent() {
            return Err(Error::CorruptedModel("vocabulary id/token maps disagree".into()));
        }
        model.validate_payload()?;

        Ok(model)
    }

    fn validate_payload(&self) -> Result<(), Error> {
        match &self.payload {
            PersistedPayload::Bpe { merges } | PersistedPayload::Bbpe { merges } => {
                for rule in merges {
                    if !self.vocab.contains(&rule.left) || !self.vocab.contains(&rule.right) {
                        return Err(Error::CorruptedModel(format!(
                            "merge rule ({}, {}) references a token missing from the vocabulary",
                            rule.left, rule.right
                        )));
                    }
                }
                Ok(())
            }
            PersistedPayload::Unigram { score_bits } => {
                if score_bits.len() != self.vocab.size() {
                    return Err(Error::CorruptedModel(format!(
                        "score count {} does not match vocabulary size {}",
                        score_bits.len(),
                        self.vocab.size()
                    )));
                }
                Ok(())
            }
            PersistedPayload::WordPiece { continuation } => {
                if continuation.len() != self.vocab.size() {
                    return Err(Error::CorruptedModel(format!(
                        "continuation-flag count {} does not match vocabulary size {}",
                        continuation.len(),
                        self.vocab.size()
                    )));
                }
                for (id, flag) in continuation.iter().enumerate() {
                    let token = self.vocab.token_of(id as crate::TokenId).unwrap_or_default();
                    if *flag != token.starts_with("##") {
                        return Err(Error::CorruptedModel(format!(
                            "continuation flag for token '{token}' disagrees with its marker"
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_file() {
        let mut vocab = Vocabulary::new();
        vocab.add("a");
        vocab.add("b");
        vocab.add("ab");
        let model = PersistedModel::new(
            Algorithm::Bpe,
            &vocab,
            &[],
            PersistedPayload::Bpe {
                merges: vec![MergeRule { left: "a".into(), right: "b".into() }],
            },
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        model.save(&path).unwrap();
        let loaded = PersistedModel::load(&path, Algorithm::Bpe).unwrap();
        assert_eq!(loaded.vocab.size(), 3);
    }

    #[test]
    fn algorithm_mismatch_is_rejected() {
        let vocab = Vocabulary::new();
        let model = PersistedModel::new(
            Algorithm::Bpe,
            &vocab,
            &[],
            PersistedPayload::Bpe { merges: vec![] },
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        model.save(&path).unwrap();
        assert!(matches!(
            PersistedModel::load(&path, Algorithm::Unigram),
            Err(Error::AlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            PersistedModel::load("/nonexistent/path/to/model.json", Algorithm::Bpe),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn corrupted_contents_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "not json at all").unwrap();
        assert!(matches!(
            PersistedModel::load(&path, Algorithm::Bpe),
            Err(Error::CorruptedModel(_))
        ));
    }
}
