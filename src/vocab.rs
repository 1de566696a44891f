//! Bidirectional token vocabulary store.
//!
//! Shared by all four engines. Identifiers are assigned densely from zero in
//! insertion order; `add` is idempotent so callers never have to check for
//! existence first.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::TokenId;

/// An insertion-ordered bidirectional mapping between token strings and ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vocabulary {
    tokens: Vec<String>,
    token_to_id: HashMap<String, TokenId>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `token` if not already present, returning its id either way.
    pub fn add(&mut self, token: impl Into<String>) -> TokenId {
        let token = token.into();
        if let Some(&id) = self.token_to_id.get(&token) {
            return id;
        }
        let id = self.tokens.len() as TokenId;
        self.token_to_id.insert(token.clone(), id);
        self.tokens.push(token);
        id
    }

    pub fn id_of(&self, token: &str) -> Option<TokenId> {
        self.token_to_id.get(token).copied()
    }

    pub fn token_of(&self, id: TokenId) -> Option<&str> {
        self.tokens.get(id as usize).map(String::as_str)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token_to_id.contains_key(token)
    }

    pub fn size(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &str)> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(id, tok)| (id as TokenId, tok.as_str()))
    }

    /// Checks the two maps agree and every id is in range; used after load.
    pub(crate) fn is_internally_consistent(&self) -> bool {
        if self.token_to_id.len() != self.tokens.len() {
            return false;
        }
        for (id, token) in self.tokens.iter().enumerate() {
            match self.token_to_id.get(token) {
                Some(&mapped) if mapped as usize == id => {}
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let mut v = Vocabulary::new();
        let a = v.add("hello");
        let b = v.add("hello");
        assert_eq!(a, b);
        assert_eq!(v.size(), 1);
    }

    #[test]
    fn ids_are_dense_and_ordered() {
        let mut v = Vocabulary::new();
        v.add("a");
        v.add("b");
        v.add("c");
        assert_eq!(v.id_of("a"), Some(0));
        assert_eq!(v.id_of("b"), Some(1));
        assert_eq!(v.id_of("c"), Some(2));
        assert_eq!(v.token_of(1), Some("b"));
    }

    #[test]
    fn consistency_check_detects_agreement() {
        let mut v = Vocabulary::new();
        v.add("x");
        v.add("y");
        assert!(v.is_internally_consistent());
    }
}
