//! Coreference entities and their mentions
//!
//! Entities are owned by the [`Document`]. A mention refers to words by
//! handle; its words may come from several trees of one bundle (parallel
//! zones) but never from different bundles.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::node::NodeId;
use rustc_hash::FxHashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorefMention {
    head: NodeId,
    words: Vec<NodeId>,
}

impl CorefMention {
    pub fn head(&self) -> NodeId {
        self.head
    }

    /// Words ordered by tree, then by ord, as of when the mention was created
    ///
    /// Later word-order edits do not re-sort them.
    pub fn words(&self) -> &[NodeId] {
        &self.words
    }
}

#[derive(Debug, Clone)]
pub struct CorefEntity {
    eid: String,
    pub etype: String,
    mentions: Vec<CorefMention>,
}

impl CorefEntity {
    pub fn eid(&self) -> &str {
        &self.eid
    }

    pub fn mentions(&self) -> &[CorefMention] {
        &self.mentions
    }
}

impl Document {
    pub fn coref_entities(&self) -> &[CorefEntity] {
        &self.entities
    }

    pub fn coref_entity(&self, eid: &str) -> Option<&CorefEntity> {
        self.entities.iter().find(|e| e.eid == eid)
    }

    /// Register a new entity; `None` picks the first free id of the form `e<N>`
    pub fn create_coref_entity(&mut self, eid: Option<&str>, etype: &str) -> Result<&CorefEntity> {
        let eid = match eid {
            Some(eid) if eid.is_empty() || eid.contains(['|', '=', ' ', '(', ')']) => {
                return Err(Error::configuration(format!("invalid entity id {eid:?}")));
            }
            Some(eid) if self.coref_entity(eid).is_some() => {
                return Err(Error::structural(format!("entity {eid} already exists")));
            }
            Some(eid) => eid.to_string(),
            None => {
                let used: FxHashSet<&str> = self.entities.iter().map(|e| e.eid.as_str()).collect();
                let mut n = self.entities.len() + 1;
                while used.contains(format!("e{n}").as_str()) {
                    n += 1;
                }
                format!("e{n}")
            }
        };
        self.entities.push(CorefEntity {
            eid,
            etype: etype.to_string(),
            mentions: Vec::new(),
        });
        let last = self.entities.len() - 1;
        Ok(&self.entities[last])
    }

    /// Sort key of a word: (bundle, tree within bundle, ord)
    fn word_key(&self, id: NodeId) -> Result<(usize, usize, usize)> {
        for (b, bundle) in self.bundles().iter().enumerate() {
            for (t, tree) in bundle.trees().iter().enumerate() {
                if tree.id() == id.tree() {
                    let node = tree.node(id)?;
                    if id.is_root() {
                        return Err(Error::structural("a mention cannot contain a virtual root"));
                    }
                    return Ok((b, t, node.ord()));
                }
            }
        }
        Err(Error::structural(format!("node {id} is not part of this document")))
    }

    /// Word of `words` whose parent lies outside of them, first in order
    fn default_head(&self, words: &[NodeId]) -> Option<NodeId> {
        let inside: FxHashSet<NodeId> = words.iter().copied().collect();
        words
            .iter()
            .copied()
            .find(|&w| match self.node(w).and_then(|n| n.parent()) {
                Some(parent) => !inside.contains(&parent),
                None => true,
            })
            .or_else(|| words.first().copied())
    }

    /// Add a mention of entity `eid` spanning `words`
    ///
    /// Returns the index of the new mention within the entity.
    pub fn create_coref_mention(
        &mut self,
        eid: &str,
        words: &[NodeId],
        head: Option<NodeId>,
    ) -> Result<usize> {
        let Some(entity) = self.entities.iter().position(|e| e.eid == eid) else {
            return Err(Error::precondition(format!("no entity with id {eid}")));
        };
        if words.is_empty() {
            return Err(Error::precondition("a mention needs at least one word"));
        }
        let mut keyed = Vec::with_capacity(words.len());
        for &word in words {
            keyed.push((self.word_key(word)?, word));
        }
        keyed.sort_by_key(|(key, _)| *key);
        keyed.dedup();
        if keyed.first().map(|k| k.0.0) != keyed.last().map(|k| k.0.0) {
            return Err(Error::structural(format!(
                "mention of {eid} spans more than one bundle"
            )));
        }
        let words: Vec<NodeId> = keyed.into_iter().map(|(_, w)| w).collect();
        let head = match head {
            Some(head) if words.contains(&head) => head,
            Some(head) => {
                return Err(Error::structural(format!(
                    "mention head {head} is not one of its words"
                )));
            }
            None => self
                .default_head(&words)
                .ok_or_else(|| Error::precondition("a mention needs at least one word"))?,
        };
        let mentions = &mut self.entities[entity].mentions;
        mentions.push(CorefMention { head, words });
        Ok(mentions.len() - 1)
    }

    /// Mentions containing `id`, with the id of their entity
    pub fn mentions_of(&self, id: NodeId) -> Vec<(&str, &CorefMention)> {
        self.entities
            .iter()
            .flat_map(|e| e.mentions.iter().map(move |m| (e.eid.as_str(), m)))
            .filter(|(_, m)| m.words.contains(&id))
            .collect()
    }

    /// Ords of a single-tree mention as ranges, e.g. `2-4,6`
    pub fn mention_span(&self, mention: &CorefMention) -> Result<String> {
        let tree = self
            .tree_of(mention.head)
            .ok_or_else(|| Error::structural("mention head is not part of this document"))?;
        let mut ords = Vec::with_capacity(mention.words.len());
        for &word in &mention.words {
            if word.tree() != tree.id() {
                return Err(Error::precondition(
                    "mention spans several trees and has no single-tree span",
                ));
            }
            ords.push(tree.node(word)?.ord());
        }
        ords.sort_unstable();

        let mut ranges: Vec<String> = Vec::new();
        let mut i = 0;
        while i < ords.len() {
            let start = ords[i];
            let mut end = start;
            while i + 1 < ords.len() && ords[i + 1] == end + 1 {
                i += 1;
                end = ords[i];
            }
            ranges.push(if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            });
            i += 1;
        }
        Ok(ranges.join(","))
    }

    pub fn remove_coref_entity(&mut self, eid: &str) -> Option<CorefEntity> {
        let position = self.entities.iter().position(|e| e.eid == eid)?;
        Some(self.entities.remove(position))
    }

    /// Forget removed words; drop mentions and entities left empty
    ///
    /// A mention whose head was removed gets a new default head.
    pub fn prune_coref(&mut self) -> usize {
        let mut entities = std::mem::take(&mut self.entities);
        let mut dropped = 0;
        for entity in &mut entities {
            entity.mentions.retain_mut(|mention| {
                mention.words.retain(|&w| self.node(w).is_some());
                if mention.words.is_empty() {
                    dropped += 1;
                    return false;
                }
                if !mention.words.contains(&mention.head) {
                    if let Some(head) = self.default_head(&mention.words) {
                        mention.head = head;
                    }
                }
                true
            });
        }
        entities.retain(|e| !e.mentions.is_empty());
        self.entities = entities;
        if dropped > 0 {
            tracing::debug!("pruned {dropped} empty coreference mentions");
        }
        dropped
    }
}
