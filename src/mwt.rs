//! Multiword tokens and surface tokens

use crate::dualdict::DualDict;
use crate::node::{NodeId, TreeId};

/// Handle of a multiword token within its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MwtId {
    pub(crate) tree: TreeId,
    pub(crate) slot: u32,
}

impl MwtId {
    pub(crate) fn new(tree: TreeId, slot: usize) -> Self {
        Self {
            tree,
            slot: slot as u32,
        }
    }

    pub(crate) fn index(&self) -> usize {
        self.slot as usize
    }
}

/// A surface token made of several syntactic words, e.g. "del" = "de" + "el"
///
/// The words are owned by the tree; the token only refers to them. Its
/// `feats` and `misc` hold token-level attributes such as `Typo=Yes` or
/// `SpaceAfter=No`.
#[derive(Debug, Clone)]
pub struct MultiwordToken {
    pub(crate) words: Vec<NodeId>,
    pub form: String,
    pub feats: DualDict,
    pub misc: DualDict,
}

impl MultiwordToken {
    pub(crate) fn new(words: Vec<NodeId>, form: &str) -> Self {
        Self {
            words,
            form: form.to_string(),
            feats: DualDict::new(),
            misc: DualDict::new(),
        }
    }

    /// Words in ord order
    pub fn words(&self) -> &[NodeId] {
        &self.words
    }

    pub fn first_word(&self) -> Option<NodeId> {
        self.words.first().copied()
    }

    pub fn last_word(&self) -> Option<NodeId> {
        self.words.last().copied()
    }
}

/// One surface token: a plain word or a multiword token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Word(NodeId),
    Multiword(MwtId),
}

impl Token {
    pub fn is_mwt(&self) -> bool {
        matches!(self, Token::Multiword(_))
    }
}
