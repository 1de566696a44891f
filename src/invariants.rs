//! Debug-only invariant assertions shared by the four engines.
//!
//! These compile to no-ops in release builds; they exist to catch
//! vocabulary/token-id mismatches during development rather than at a user's
//! call site (which should always get a proper `Error`, not a panic).

use crate::vocab::Vocabulary;
use crate::TokenId;

/// Asserts that every token id in `tokens` is below `vocab_size`.
#[inline]
pub(crate) fn assert_tokens_in_bounds(tokens: &[TokenId], vocab_size: usize) {
    #[cfg(debug_assertions)]
    {
        for (i, &token) in tokens.iter().enumerate() {
            debug_assert!(
                (token as usize) < vocab_size,
                "invariant violation: token[{i}] = {token} >= vocab_size ({vocab_size})"
            );
        }
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = (tokens, vocab_size);
    }
}

/// Asserts postconditions after encoding: every emitted id resolves in the
/// vocabulary that produced it.
#[inline]
pub(crate) fn assert_encode_postconditions(tokens: &[TokenId], vocab_size: usize) {
    assert_tokens_in_bounds(tokens, vocab_size);
}

/// Asserts preconditions before decoding tokens known to have been produced
/// internally (never use this in place of validating user-supplied ids —
/// those must go through the `UnknownToken` error path instead).
#[inline]
#[allow(dead_code)]
pub(crate) fn assert_decode_preconditions(tokens: &[TokenId], vocab_size: usize) {
    assert_tokens_in_bounds(tokens, vocab_size);
}

/// Asserts that a vocabulary's id/token maps agree with each other.
#[inline]
#[allow(dead_code)]
pub(crate) fn assert_vocabulary_consistent(vocab: &Vocabulary) {
    #[cfg(debug_assertions)]
    {
        debug_assert!(
            vocab.is_internally_consistent(),
            "invariant violation: vocabulary id/token maps disagree"
        );
    }
    #[cfg(not(debug_assertions))]
    {
        let _ = vocab;
    }
}

/// Asserts that a single token id is valid against `vocab_size`.
#[inline]
#[allow(dead_code)]
pub(crate) fn assert_valid_token(token: TokenId, vocab_size: usize) {
    assert_tokens_in_bounds(std::slice::from_ref(&token), vocab_size);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_in_bounds_accepts_valid() {
        assert_tokens_in_bounds(&[0, 100, 999], 1000);
    }

    #[test]
    #[should_panic(expected = "invariant violation")]
    #[cfg(debug_assertions)]
    fn tokens_in_bounds_rejects_out_of_range() {
        assert_tokens_in_bounds(&[0, 100, 1000], 1000);
    }

    #[test]
    fn vocabulary_consistency_holds_after_inserts() {
        let mut vocab = Vocabulary::new();
        vocab.add("a");
        vocab.add("b");
        assert_vocabulary_consistent(&vocab);
    }
}
