//! # zero-tokenizer
//!
//! Pure Rust subword tokenizer library: train, encode, decode, and persist
//! vocabularies under four algorithm families.
//!
//! ## Example
//!
//! ```no_run
//! use zero_tokenizer::bpe::BpeTokenizer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut tokenizer = BpeTokenizer::new();
//! tokenizer.train(["low lower lowest newer newest"], 32, &["<unk>"])?;
//! let tokens = tokenizer.encode("lower newest")?;
//! let text = tokenizer.decode(&tokens)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Supported algorithm families
//!
//! - Character-level BPE (`bpe`)
//! - Byte-level BPE (`bbpe`)
//! - Unigram Language Model (`unigram`)
//! - WordPiece (`wordpiece`)

pub mod bbpe;
pub mod bpe;
pub mod byte_encoder;
mod dictionary;
mod invariants;
mod merge_model;
mod persistence;
mod pretokenize;
pub mod unigram;
pub mod vocab;
pub mod wordpiece;

pub use vocab::Vocabulary;

/// Token identifiers are dense `u32`s assigned in insertion order by
/// `Vocabulary::add`, matching every engine's id space.
pub type TokenId = u32;

/// Algorithm tag recorded in a persisted model so `load` can refuse a file
/// trained under a different engine (see `persistence::PersistedModel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Algorithm {
    Bpe,
    Bbpe,
    Unigram,
    WordPiece,
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Algorithm::Bpe => "BPE",
            Algorithm::Bbpe => "BBPE",
            Algorithm::Unigram => "Unigram",
            Algorithm::WordPiece => "WordPiece",
        };
        f.write_str(name)
    }
}

/// Training configuration shared by every engine. BPE/BBPE/WordPiece only
/// consult `vocab_size` and `special_tokens`; the remaining fields are
/// Unigram-specific (see `unigram::UnigramTokenizer::train`).
#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub vocab_size: usize,
    pub special_tokens: Vec<String>,
    /// Maximum codepoint length of a candidate Unigram piece.
    pub max_piece_length: usize,
    /// Inner E/M iterations run per pruning round.
    pub inner_em_iterations: usize,
    /// Fraction of non-mandatory pieces dropped per pruning round.
    pub prune_fraction: f64,
    /// Hard cap on the number of candidate pieces considered during seeding.
    pub seed_cap: usize,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            vocab_size: 8_000,
            special_tokens: Vec::new(),
            max_piece_length: 16,
            inner_em_iterations: 2,
            prune_fraction: 0.2,
            seed_cap: 1_000_000,
        }
    }
}

/// The error type returned by every fallible operation in this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("requested vocabulary size {requested} is below the minimum {minimum} required to hold the seed alphabet and special tokens")]
    InvalidVocabSize { requested: usize, minimum: usize },

    #[error("training corpus contained no characters to seed a vocabulary from")]
    EmptyCorpus,

    #[error("token id {0} is not present in the vocabulary")]
    UnknownToken(TokenId),

    #[error("character {0:?} has no vocabulary entry and no <unk> fallback is configured")]
    UnknownCharacter(char),

    #[error("model file was trained for {found} but loaded as {expected}")]
    AlgorithmMismatch { expected: Algorithm, found: Algorithm },

    #[error("model file is corrupted: {0}")]
    CorruptedModel(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
