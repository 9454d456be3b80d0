//! Dependency trees (one sentence in one zone)
//!
//! A [`Root`] owns all its nodes and multiword tokens in index-stable arenas.
//! Parents, children and multiword-token membership are plain handles into
//! those arenas. Word order is a separate list; every operation that changes
//! it renumbers all nodes before returning, and rolls back if the new order
//! would split a multiword token.
//!
//! Invariants after every public operation:
//! - ords of live nodes are exactly 1..=N, in word order
//! - every node reaches the virtual root by following parents, without cycles
//! - every multiword token covers a contiguous, sorted run of words, and each
//!   of those words points back to it

use crate::dualdict::DualDict;
use crate::error::{Error, Result};
use crate::links::{self, Deps, Link};
use crate::mwt::{MultiwordToken, MwtId, Token};
use crate::node::{Node, NodeAttrs, NodeId, TreeId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::ops::Index;
use std::str::FromStr;

/// What to do with the children of a removed node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Attach children to the parent of the removed node
    Rehang,
    /// Like `Rehang`, but log a warning when there are children to rehang
    RehangWarn,
    /// Attach children to the virtual root as separate subtrees
    ReattachToRoot,
    /// Remove the whole subtree
    RemoveSubtree,
    /// Fail if the node has children
    Refuse,
}

impl FromStr for OrphanPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rehang" => Ok(OrphanPolicy::Rehang),
            "rehang_warn" => Ok(OrphanPolicy::RehangWarn),
            "reattach_to_root" => Ok(OrphanPolicy::ReattachToRoot),
            "remove_subtree" => Ok(OrphanPolicy::RemoveSubtree),
            "refuse" => Ok(OrphanPolicy::Refuse),
            other => Err(Error::configuration(format!(
                "unknown orphan policy {other:?}"
            ))),
        }
    }
}

/// Which text `get_sentence` falls back to when the tree has none stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFallback {
    Detokenize,
    Empty,
    Fail,
}

impl FromStr for TextFallback {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "detokenize" => Ok(TextFallback::Detokenize),
            "empty" => Ok(TextFallback::Empty),
            "fatal" | "fail" => Ok(TextFallback::Fail),
            other => Err(Error::configuration(format!(
                "unknown text fallback {other:?}"
            ))),
        }
    }
}

/// Where `create_child_at` puts the new node in word order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    End,
    Before(NodeId),
    After(NodeId),
}

/// One sentence: a virtual root (ord 0) and the words hanging from it
#[derive(Debug)]
pub struct Root {
    id: TreeId,
    nodes: Vec<Option<Node>>,
    order: Vec<NodeId>,
    mwts: Vec<Option<MultiwordToken>>,
    zone: String,
    bundle_id: String,
    /// Raw sentence text, if known
    pub text: Option<String>,
    /// Free-form comment lines, without the leading `#`
    pub comment: String,
    /// `newdoc` marker; an empty string is a bare marker without id
    pub newdoc: Option<String>,
    /// `newpar` marker; an empty string is a bare marker without id
    pub newpar: Option<String>,
}

impl Root {
    pub fn new(zone: &str) -> Self {
        Self {
            id: TreeId::fresh(),
            nodes: vec![Some(Node::sentinel())],
            order: Vec::new(),
            mwts: Vec::new(),
            zone: zone.to_string(),
            bundle_id: String::new(),
            text: None,
            comment: String::new(),
            newdoc: None,
            newpar: None,
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    /// Handle of the virtual root
    pub fn root_id(&self) -> NodeId {
        NodeId::new(self.id, 0)
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    pub(crate) fn set_zone(&mut self, zone: &str) {
        self.zone = zone.to_string();
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub(crate) fn set_bundle_id(&mut self, bundle_id: &str) {
        self.bundle_id = bundle_id.to_string();
    }

    /// `bundle_id`, `bundle_id/zone`, or just the zone for a detached tree
    pub fn address(&self) -> String {
        match (self.bundle_id.is_empty(), self.zone.is_empty()) {
            (_, true) => self.bundle_id.clone(),
            (true, false) => self.zone.clone(),
            (false, false) => format!("{}/{}", self.bundle_id, self.zone),
        }
    }

    pub fn sent_id(&self) -> String {
        self.address()
    }

    /// Append one comment line
    pub fn add_comment(&mut self, line: &str) {
        if !self.comment.is_empty() && !self.comment.ends_with('\n') {
            self.comment.push('\n');
        }
        self.comment.push_str(line.trim_end_matches('\n'));
        self.comment.push('\n');
    }

    // ===== Lookup =====

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        if id.tree != self.id {
            return None;
        }
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.tree != self.id {
            return None;
        }
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Like `get_node`, with an error saying why the handle is invalid
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.check(id)?;
        self.get_node(id)
            .ok_or_else(|| Error::structural(format!("node {id} was removed")))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.check(id)?;
        self.get_node_mut(id)
            .ok_or_else(|| Error::structural(format!("node {id} was removed")))
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if id.tree != self.id {
            return Err(Error::structural(format!(
                "node {id} belongs to a different tree than {}",
                self.address()
            )));
        }
        match self.nodes.get(id.index()) {
            Some(Some(_)) => Ok(()),
            _ => Err(Error::structural(format!("node {id} was removed"))),
        }
    }

    fn check_word(&self, id: NodeId) -> Result<()> {
        self.check(id)?;
        if id.is_root() {
            return Err(Error::structural(format!(
                "the virtual root of {} cannot be used as a word",
                self.address()
            )));
        }
        Ok(())
    }

    /// Number of words
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// All words in word order
    pub fn descendants(&self) -> Vec<NodeId> {
        self.order.clone()
    }

    /// Word with the given ord (0 = virtual root)
    pub fn node_at(&self, ord: usize) -> Option<NodeId> {
        match ord {
            0 => Some(self.root_id()),
            _ => self.order.get(ord - 1).copied(),
        }
    }

    fn ord(&self, id: NodeId) -> usize {
        self.get_node(id).map_or(0, Node::ord)
    }

    fn sort_by_ord(&self, ids: &mut [NodeId]) {
        ids.sort_by_key(|&id| self.ord(id));
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.node(id)?.parent)
    }

    /// Children in word order
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut children = self.node(id)?.children.clone();
        self.sort_by_ord(&mut children);
        Ok(children)
    }

    /// All nodes below `id` (excluding it) in word order
    pub fn descendants_of(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let mut stack = self.node(id)?.children.clone();
        let mut result = Vec::new();
        while let Some(current) = stack.pop() {
            result.push(current);
            if let Some(node) = self.get_node(current) {
                stack.extend(node.children.iter().copied());
            }
        }
        self.sort_by_ord(&mut result);
        Ok(result)
    }

    /// Whether `id` lies (strictly) below `ancestor`
    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> Result<bool> {
        self.check(ancestor)?;
        let mut current = self.node(id)?.parent;
        let mut steps = 0;
        while let Some(node) = current {
            if node == ancestor {
                return Ok(true);
            }
            steps += 1;
            if steps > self.order.len() {
                return Err(Error::structural(format!(
                    "cycle detected above node {id} in {}",
                    self.address()
                )));
            }
            current = self.get_node(node).and_then(|n| n.parent);
        }
        Ok(false)
    }

    /// Other children of the same parent, in word order
    pub fn siblings(&self, id: NodeId) -> Result<Vec<NodeId>> {
        match self.node(id)?.parent {
            Some(parent) => {
                let mut siblings = self.children(parent)?;
                siblings.retain(|&s| s != id);
                Ok(siblings)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Whether `a` comes before `b` in word order
    pub fn precedes(&self, a: NodeId, b: NodeId) -> Result<bool> {
        Ok(self.node(a)?.ord < self.node(b)?.ord)
    }

    pub fn prev_node(&self, id: NodeId) -> Result<Option<NodeId>> {
        let ord = self.node(id)?.ord;
        Ok(if ord <= 1 { None } else { self.node_at(ord - 1) })
    }

    pub fn next_node(&self, id: NodeId) -> Result<Option<NodeId>> {
        let ord = self.node(id)?.ord;
        if id.is_root() {
            return Ok(None);
        }
        Ok(self.node_at(ord + 1))
    }

    /// Stable identifier `sent_id#ord` for diagnostics
    pub fn address_of(&self, id: NodeId) -> Result<String> {
        Ok(format!("{}#{}", self.address(), self.node(id)?.ord))
    }

    // ===== Structural edits =====

    /// Create a new last word as a child of `parent`
    pub fn create_child(&mut self, parent: NodeId, attrs: NodeAttrs) -> Result<NodeId> {
        self.check(parent)?;
        let id = NodeId::new(self.id, self.nodes.len());
        let node = Node::from_attrs(attrs, self.order.len() + 1, Some(parent));
        self.nodes.push(Some(node));
        self.order.push(id);
        if let Some(parent_node) = self.get_node_mut(parent) {
            parent_node.children.push(id);
        }
        Ok(id)
    }

    /// Create a child of `parent` and place it in word order in one step
    ///
    /// If the placement is invalid (e.g. it would split a multiword token),
    /// the new node is discarded and the tree is left unchanged.
    pub fn create_child_at(
        &mut self,
        parent: NodeId,
        attrs: NodeAttrs,
        placement: Placement,
    ) -> Result<NodeId> {
        match placement {
            Placement::Before(target) | Placement::After(target) => self.check_word(target)?,
            Placement::End => {}
        }
        let id = self.create_child(parent, attrs)?;
        let shifted = match placement {
            Placement::End => Ok(()),
            Placement::Before(target) => self.shift_before_node(id, target),
            Placement::After(target) => self.shift_after_node(id, target),
        };
        if let Err(err) = shifted {
            self.remove(id, OrphanPolicy::Refuse)?;
            return Err(err);
        }
        Ok(id)
    }

    fn attach(&mut self, id: NodeId, parent: NodeId) {
        if let Some(old) = self.get_node(id).and_then(|n| n.parent) {
            if let Some(old_parent) = self.get_node_mut(old) {
                old_parent.children.retain(|&c| c != id);
            }
        }
        if let Some(node) = self.get_node_mut(id) {
            node.parent = Some(parent);
        }
        if let Some(parent_node) = self.get_node_mut(parent) {
            parent_node.children.push(id);
        }
    }

    /// Reattach `id` under `parent`
    ///
    /// Both must belong to this tree, and `parent` must not lie in the subtree
    /// of `id`.
    pub fn set_parent(&mut self, id: NodeId, parent: NodeId) -> Result<()> {
        self.check_word(id)?;
        self.check(parent)?;
        if parent == id || self.is_descendant_of(parent, id)? {
            return Err(Error::structural(format!(
                "setting the parent of {} to {} would lead to a cycle",
                self.address_of(id)?,
                self.address_of(parent)?
            )));
        }
        self.attach(id, parent);
        Ok(())
    }

    /// Move `id` (without its subtree) right before `target`
    pub fn shift_before_node(&mut self, id: NodeId, target: NodeId) -> Result<()> {
        self.shift_node(id, target, false)
    }

    /// Move `id` (without its subtree) right after `target`
    pub fn shift_after_node(&mut self, id: NodeId, target: NodeId) -> Result<()> {
        self.shift_node(id, target, true)
    }

    fn shift_node(&mut self, id: NodeId, target: NodeId, after: bool) -> Result<()> {
        self.check_word(id)?;
        self.check_word(target)?;
        if id == target {
            return Ok(());
        }
        self.reorder(&[id], target, after)
    }

    /// Move `id` together with all its descendants right before `target`
    pub fn shift_subtree_before_node(&mut self, id: NodeId, target: NodeId) -> Result<()> {
        self.shift_subtree(id, target, false)
    }

    /// Move `id` together with all its descendants right after `target`
    pub fn shift_subtree_after_node(&mut self, id: NodeId, target: NodeId) -> Result<()> {
        self.shift_subtree(id, target, true)
    }

    fn shift_subtree(&mut self, id: NodeId, target: NodeId, after: bool) -> Result<()> {
        self.check_word(id)?;
        self.check_word(target)?;
        let mut moving = self.descendants_of(id)?;
        moving.push(id);
        if moving.contains(&target) {
            return Err(Error::structural(format!(
                "cannot shift the subtree of {} relative to its own member {}",
                self.address_of(id)?,
                self.address_of(target)?
            )));
        }
        self.reorder(&moving, target, after)
    }

    /// Move `moving` as one block next to `target`, keeping their relative order
    fn reorder(&mut self, moving: &[NodeId], target: NodeId, after: bool) -> Result<()> {
        self.materialize_deps()?;
        let moving: FxHashSet<NodeId> = moving.iter().copied().collect();
        let saved = self.order.clone();

        let block: Vec<NodeId> = saved.iter().copied().filter(|id| moving.contains(id)).collect();
        let mut order: Vec<NodeId> = saved.iter().copied().filter(|id| !moving.contains(id)).collect();
        let Some(pos) = order.iter().position(|&id| id == target) else {
            return Err(Error::structural(format!("node {target} is not in word order")));
        };
        let pos = if after { pos + 1 } else { pos };
        order.splice(pos..pos, block);

        self.order = order;
        self.renumber();
        if let Err(err) = self.check_mwt_contiguity() {
            self.order = saved;
            self.renumber();
            return Err(err);
        }
        Ok(())
    }

    /// Assign ords from word order and re-sort multiword token words
    fn renumber(&mut self) {
        let order = std::mem::take(&mut self.order);
        for (i, &id) in order.iter().enumerate() {
            if let Some(node) = self.get_node_mut(id) {
                node.ord = i + 1;
            }
        }
        self.order = order;

        let ords: FxHashMap<NodeId, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i + 1))
            .collect();
        for mwt in self.mwts.iter_mut().flatten() {
            mwt.words.sort_by_key(|id| ords.get(id).copied().unwrap_or(0));
        }
    }

    fn check_mwt_contiguity(&self) -> Result<()> {
        for mwt in self.mwts.iter().flatten() {
            if !self.is_contiguous(&mwt.words) {
                return Err(Error::structural(format!(
                    "multiword token {:?} in {} would not be contiguous",
                    mwt.form,
                    self.address()
                )));
            }
        }
        Ok(())
    }

    /// Whether `words`, as listed, have consecutive increasing ords
    fn is_contiguous(&self, words: &[NodeId]) -> bool {
        !words.is_empty()
            && words
                .windows(2)
                .all(|pair| self.ord(pair[1]) == self.ord(pair[0]) + 1)
    }

    /// Delete a word
    ///
    /// The policy decides what happens to its children; there is no default.
    /// Removed words leave their multiword token (a token left with fewer
    /// than two words is dissolved), and enhanced dependencies pointing at
    /// them are dropped.
    pub fn remove(&mut self, id: NodeId, policy: OrphanPolicy) -> Result<()> {
        self.check_word(id)?;
        let node = self.node(id)?;
        let parent = node.parent.unwrap_or(self.root_id());
        let children = node.children.clone();

        let mut doomed = vec![id];
        if !children.is_empty() {
            match policy {
                OrphanPolicy::Refuse => {
                    return Err(Error::structural(format!(
                        "cannot remove {}: it has {} children",
                        self.address_of(id)?,
                        children.len()
                    )));
                }
                OrphanPolicy::RemoveSubtree => doomed.extend(self.descendants_of(id)?),
                OrphanPolicy::Rehang | OrphanPolicy::RehangWarn | OrphanPolicy::ReattachToRoot => {}
            }
        }
        self.materialize_deps()?;

        match policy {
            OrphanPolicy::Rehang | OrphanPolicy::RehangWarn => {
                if policy == OrphanPolicy::RehangWarn && !children.is_empty() {
                    tracing::warn!(
                        "{} is being removed with policy {:?}, but it has children",
                        self.address_of(id)?,
                        policy
                    );
                }
                for &child in &children {
                    self.attach(child, parent);
                }
            }
            OrphanPolicy::ReattachToRoot => {
                let root = self.root_id();
                for &child in &children {
                    self.attach(child, root);
                }
            }
            OrphanPolicy::RemoveSubtree | OrphanPolicy::Refuse => {}
        }

        if let Some(parent_node) = self.get_node_mut(parent) {
            parent_node.children.retain(|&c| c != id);
        }
        let doomed: FxHashSet<NodeId> = doomed.into_iter().collect();
        let mut shrunk: Vec<MwtId> = Vec::new();
        for &gone in &doomed {
            let mwt = self.get_node(gone).and_then(|n| n.mwt);
            if let Some(mwt) = mwt {
                if let Some(Some(token)) = self.mwts.get_mut(mwt.index()) {
                    token.words.retain(|&w| w != gone);
                    if !shrunk.contains(&mwt) {
                        shrunk.push(mwt);
                    }
                }
            }
            self.nodes[gone.index()] = None;
        }
        // A token needs two words; a lone survivor takes over its SpaceAfter
        for mwt in shrunk {
            if self.mwts[mwt.index()].as_ref().is_some_and(|t| t.words.len() < 2) {
                self.remove_multiword_token(mwt)?;
            }
        }
        self.order.retain(|id| !doomed.contains(id));
        for node in self.nodes.iter_mut().flatten() {
            if let Deps::Parsed(links) = &mut node.deps {
                links.retain(|link| !doomed.contains(&link.parent));
            }
        }
        self.renumber();
        Ok(())
    }

    // ===== Multiword tokens =====

    pub fn multiword_token(&self, id: MwtId) -> Result<&MultiwordToken> {
        self.check_mwt(id)?;
        self.mwts[id.index()]
            .as_ref()
            .ok_or_else(|| Error::structural("multiword token was removed"))
    }

    pub fn multiword_token_mut(&mut self, id: MwtId) -> Result<&mut MultiwordToken> {
        self.check_mwt(id)?;
        self.mwts[id.index()]
            .as_mut()
            .ok_or_else(|| Error::structural("multiword token was removed"))
    }

    fn check_mwt(&self, id: MwtId) -> Result<()> {
        if id.tree != self.id {
            return Err(Error::structural(format!(
                "multiword token belongs to a different tree than {}",
                self.address()
            )));
        }
        match self.mwts.get(id.index()) {
            Some(Some(_)) => Ok(()),
            _ => Err(Error::structural("multiword token was removed")),
        }
    }

    /// All multiword tokens in word order
    pub fn multiword_tokens(&self) -> Vec<MwtId> {
        let mut ids: Vec<(usize, MwtId)> = self
            .mwts
            .iter()
            .enumerate()
            .filter_map(|(slot, mwt)| {
                let first = mwt.as_ref()?.first_word()?;
                Some((self.ord(first), MwtId::new(self.id, slot)))
            })
            .collect();
        ids.sort_by_key(|(ord, _)| *ord);
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Wrap contiguous `words` into a multiword token with surface `form`
    ///
    /// Words that already belong to a multiword token are spliced into it: the
    /// old token's word list, with the overlapping words replaced by `words`,
    /// becomes the new token, and the old token is dissolved. The result must
    /// be contiguous in word order.
    pub fn create_multiword_token(&mut self, words: &[NodeId], form: &str) -> Result<MwtId> {
        if words.is_empty() {
            return Err(Error::precondition(
                "a multiword token needs at least one word",
            ));
        }
        for &word in words {
            self.check_word(word)?;
        }
        let mut result: Vec<NodeId> = words.to_vec();
        self.sort_by_ord(&mut result);
        result.dedup();

        let mut old_tokens: Vec<MwtId> = Vec::new();
        for &word in &result {
            if let Some(mwt) = self.get_node(word).and_then(|n| n.mwt) {
                if !old_tokens.contains(&mwt) {
                    old_tokens.push(mwt);
                }
            }
        }

        let mut inherited_misc = DualDict::new();
        for &old in &old_tokens {
            let token = self.multiword_token(old)?;
            let new_set: FxHashSet<NodeId> = result.iter().copied().collect();
            let first = token.words.iter().position(|w| new_set.contains(w));
            let last = token.words.iter().rposition(|w| new_set.contains(w));
            if let (Some(first), Some(last)) = (first, last) {
                let mut spliced = token.words[..first].to_vec();
                spliced.extend(result.iter().copied());
                spliced.extend(token.words[last + 1..].iter().copied());
                if token.last_word() == spliced.last().copied() {
                    inherited_misc = token.misc.clone();
                }
                result = spliced;
            }
        }

        if result.len() < 2 {
            return Err(Error::structural(format!(
                "multiword token {form:?} in {} would have a single word",
                self.address()
            )));
        }
        if !self.is_contiguous(&result) {
            return Err(Error::structural(format!(
                "words of multiword token {form:?} in {} are not contiguous",
                self.address()
            )));
        }

        for old in old_tokens {
            self.dissolve(old);
        }
        let id = MwtId::new(self.id, self.mwts.len());
        let mut token = MultiwordToken::new(result.clone(), form);
        token.misc = inherited_misc;
        let last = result.last().copied();
        for &word in &result {
            if let Some(node) = self.get_node_mut(word) {
                node.mwt = Some(id);
            }
        }
        if let Some(node) = last.and_then(|w| self.get_node(w)) {
            if !node.space_after() {
                token.misc.set("SpaceAfter", Some("No"));
            }
        }
        for &word in &result {
            if let Some(node) = self.get_node_mut(word) {
                node.misc.remove("SpaceAfter");
            }
        }
        self.mwts.push(Some(token));
        Ok(id)
    }

    fn dissolve(&mut self, id: MwtId) {
        if let Some(token) = self.mwts.get_mut(id.index()).and_then(Option::take) {
            for word in token.words {
                if let Some(node) = self.get_node_mut(word) {
                    node.mwt = None;
                }
            }
        }
    }

    /// Unwrap a multiword token; its words stay, `SpaceAfter=No` moves to the last one
    pub fn remove_multiword_token(&mut self, id: MwtId) -> Result<()> {
        let token = self.multiword_token(id)?;
        let last = token.last_word();
        let space_after = token.misc.value("SpaceAfter").map(str::to_string);
        self.dissolve(id);
        if let (Some(last), Some(value)) = (last, space_after) {
            if let Some(node) = self.get_node_mut(last) {
                node.misc.set("SpaceAfter", Some(&value));
            }
        }
        Ok(())
    }

    // ===== Surface tokens =====

    /// Surface tokens in word order: plain words and multiword tokens
    pub fn token_descendants(&self) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut last_mwt = None;
        for &id in &self.order {
            match self.get_node(id).and_then(|n| n.mwt) {
                Some(mwt) if last_mwt == Some(mwt) => {}
                Some(mwt) => {
                    last_mwt = Some(mwt);
                    tokens.push(Token::Multiword(mwt));
                }
                None => tokens.push(Token::Word(id)),
            }
        }
        tokens
    }

    pub fn token_form(&self, token: Token) -> Result<&str> {
        match token {
            Token::Word(id) => Ok(&self.node(id)?.form),
            Token::Multiword(id) => Ok(&self.multiword_token(id)?.form),
        }
    }

    pub fn set_token_form(&mut self, token: Token, form: &str) -> Result<()> {
        match token {
            Token::Word(id) => self.node_mut(id)?.form = form.to_string(),
            Token::Multiword(id) => self.multiword_token_mut(id)?.form = form.to_string(),
        }
        Ok(())
    }

    pub fn token_misc(&self, token: Token) -> Result<&DualDict> {
        match token {
            Token::Word(id) => Ok(&self.node(id)?.misc),
            Token::Multiword(id) => Ok(&self.multiword_token(id)?.misc),
        }
    }

    pub fn token_misc_mut(&mut self, token: Token) -> Result<&mut DualDict> {
        match token {
            Token::Word(id) => Ok(&mut self.node_mut(id)?.misc),
            Token::Multiword(id) => Ok(&mut self.multiword_token_mut(id)?.misc),
        }
    }

    /// Underlying words of a token
    pub fn token_words(&self, token: Token) -> Result<Vec<NodeId>> {
        match token {
            Token::Word(id) => {
                self.check(id)?;
                Ok(vec![id])
            }
            Token::Multiword(id) => Ok(self.multiword_token(id)?.words.clone()),
        }
    }

    // ===== Text =====

    /// Detokenize: join forms, honouring `SpaceAfter=No` and `SpacesAfter`
    pub fn compute_text(&self, use_mwt: bool) -> String {
        let mut text = String::new();
        let tokens = if use_mwt {
            self.token_descendants()
        } else {
            self.order.iter().map(|&id| Token::Word(id)).collect()
        };
        for token in tokens {
            let (Ok(form), Ok(misc)) = (self.token_form(token), self.token_misc(token)) else {
                continue;
            };
            text.push_str(form);
            text.push_str(&spaces_after(misc));
        }
        text.truncate(text.trim_end().len());
        text
    }

    /// Stored text, or a fallback chosen by `fallback` when there is none
    pub fn get_sentence(&self, fallback: TextFallback) -> Result<String> {
        if let Some(text) = &self.text {
            return Ok(text.clone());
        }
        match fallback {
            TextFallback::Detokenize => Ok(self.compute_text(true)),
            TextFallback::Empty => Ok(String::new()),
            TextFallback::Fail => Err(Error::precondition(format!(
                "tree {} has no text",
                self.address()
            ))),
        }
    }

    // ===== Enhanced dependencies =====

    fn resolver(&self) -> impl Fn(usize) -> Option<NodeId> + '_ {
        move |ord| self.node_at(ord)
    }

    /// Resolve every raw DEPS string into links
    pub(crate) fn materialize_deps(&mut self) -> Result<()> {
        let mut resolved = Vec::new();
        for (slot, node) in self.nodes.iter().enumerate() {
            if let Some(Node {
                deps: Deps::Raw(raw),
                ..
            }) = node
            {
                resolved.push((slot, links::parse_deps(raw, self.resolver())?));
            }
        }
        for (slot, parsed) in resolved {
            if let Some(node) = self.nodes[slot].as_mut() {
                node.deps = Deps::Parsed(parsed);
            }
        }
        Ok(())
    }

    pub fn deps(&self, id: NodeId) -> Result<Vec<Link>> {
        match &self.node(id)?.deps {
            Deps::Raw(raw) => links::parse_deps(raw, self.resolver()),
            Deps::Parsed(parsed) => Ok(parsed.clone()),
        }
    }

    pub fn set_deps(&mut self, id: NodeId, deps: Vec<Link>) -> Result<()> {
        for link in &deps {
            self.check(link.parent)?;
        }
        self.node_mut(id)?.deps = Deps::Parsed(deps);
        Ok(())
    }

    pub fn add_dep(&mut self, id: NodeId, parent: NodeId, deprel: &str) -> Result<()> {
        let mut deps = self.deps(id)?;
        deps.push(Link::new(parent, deprel));
        self.set_deps(id, deps)
    }

    /// DEPS in its compact string form, with current ords
    pub fn raw_deps(&self, id: NodeId) -> Result<String> {
        match &self.node(id)?.deps {
            Deps::Raw(raw) => Ok(raw.clone()),
            Deps::Parsed(parsed) => Ok(links::serialize_deps(parsed, |p| self.ord(p))),
        }
    }

    /// Store a compact DEPS string; it is resolved on first structured access
    pub fn set_raw_deps(&mut self, id: NodeId, raw: &str) -> Result<()> {
        self.node_mut(id)?.deps = Deps::from_raw(raw);
        Ok(())
    }

    // ===== Validation =====

    /// The single node attached to the virtual root
    pub fn syntactic_root(&self) -> Result<NodeId> {
        let children = self.children(self.root_id())?;
        match children.as_slice() {
            [root] => Ok(*root),
            _ => Err(Error::structural(format!(
                "tree {} has {} syntactic roots, expected exactly one",
                self.address(),
                children.len()
            ))),
        }
    }

    /// Check all structural invariants
    pub fn validate(&self) -> Result<()> {
        let live = self.nodes.iter().skip(1).flatten().count();
        if live != self.order.len() {
            return Err(Error::structural(format!(
                "{} has {live} nodes but {} in word order",
                self.address(),
                self.order.len()
            )));
        }
        for (i, &id) in self.order.iter().enumerate() {
            let node = self.node(id)?;
            if node.ord != i + 1 {
                return Err(Error::structural(format!(
                    "node {id} has ord {} at position {}",
                    node.ord,
                    i + 1
                )));
            }
            let parent = node.parent.ok_or_else(|| {
                Error::structural(format!("node {id} in {} has no parent", self.address()))
            })?;
            if !self.node(parent)?.children.contains(&id) {
                return Err(Error::structural(format!(
                    "node {id} is missing from the children of its parent"
                )));
            }
            // is_descendant_of bounds its walk and reports cycles
            if !self.is_descendant_of(id, self.root_id())? {
                return Err(Error::structural(format!(
                    "node {id} is not connected to the root of {}",
                    self.address()
                )));
            }
            if let Some(mwt) = node.mwt {
                if !self.multiword_token(mwt)?.words.contains(&id) {
                    return Err(Error::structural(format!(
                        "node {id} points to a multiword token that does not contain it"
                    )));
                }
            }
        }
        for (slot, token) in self.mwts.iter().enumerate() {
            let Some(token) = token else { continue };
            if token.words.len() < 2 {
                return Err(Error::structural(format!(
                    "multiword token {:?} in {} has fewer than two words",
                    token.form,
                    self.address()
                )));
            }
            if !self.is_contiguous(&token.words) {
                return Err(Error::structural(format!(
                    "multiword token {:?} in {} is not contiguous",
                    token.form,
                    self.address()
                )));
            }
            let id = MwtId::new(self.id, slot);
            if token
                .words
                .iter()
                .any(|&w| self.get_node(w).and_then(|n| n.mwt) != Some(id))
            {
                return Err(Error::structural(format!(
                    "a word of multiword token {:?} does not point back to it",
                    token.form
                )));
            }
        }
        Ok(())
    }

    /// Deep copy with a fresh tree identity
    pub fn copy_tree(&self) -> Root {
        let id = TreeId::fresh();
        let node_id = |n: NodeId| NodeId::new(id, n.index());
        let mwt_id = |m: MwtId| MwtId::new(id, m.index());
        let nodes = self
            .nodes
            .iter()
            .map(|slot| {
                slot.as_ref().map(|node| {
                    let mut copy = node.clone();
                    copy.parent = node.parent.map(node_id);
                    copy.children = node.children.iter().copied().map(node_id).collect();
                    copy.mwt = node.mwt.map(mwt_id);
                    if let Deps::Parsed(links) = &mut copy.deps {
                        for link in links.iter_mut() {
                            link.parent = node_id(link.parent);
                        }
                    }
                    copy
                })
            })
            .collect();
        let mwts = self
            .mwts
            .iter()
            .map(|slot| {
                slot.as_ref().map(|token| {
                    let mut copy = token.clone();
                    copy.words = token.words.iter().copied().map(node_id).collect();
                    copy
                })
            })
            .collect();
        Root {
            id,
            nodes,
            order: self.order.iter().copied().map(node_id).collect(),
            mwts,
            zone: self.zone.clone(),
            bundle_id: self.bundle_id.clone(),
            text: self.text.clone(),
            comment: self.comment.clone(),
            newdoc: self.newdoc.clone(),
            newpar: self.newpar.clone(),
        }
    }
}

impl Index<NodeId> for Root {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        match self.get_node(id) {
            Some(node) => node,
            None => panic!("invalid node {id} for tree {}", self.address()),
        }
    }
}

/// Whitespace that follows a token according to its MISC
pub(crate) fn spaces_after(misc: &DualDict) -> String {
    if let Some(spaces) = misc.value("SpacesAfter") {
        return unescape_spaces(spaces);
    }
    if misc.value("SpaceAfter") == Some("No") {
        String::new()
    } else {
        " ".to_string()
    }
}

/// Decode `\s`, `\t`, `\n`, `\r`, `\p` and `\\` from a `SpacesAfter` value
pub fn unescape_spaces(escaped: &str) -> String {
    let mut out = String::new();
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('p') => out.push('|'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Inverse of [`unescape_spaces`]
pub fn escape_spaces(spaces: &str) -> String {
    let mut out = String::new();
    for c in spaces.chars() {
        match c {
            ' ' => out.push_str("\\s"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '|' => out.push_str("\\p"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat tree: every word hangs on the first one, which hangs on the root
    fn build(forms: &[&str]) -> (Root, Vec<NodeId>) {
        let mut root = Root::new("");
        let mut ids = Vec::new();
        for form in forms {
            let parent = ids.first().copied().unwrap_or(root.root_id());
            ids.push(root.create_child(parent, NodeAttrs::new(form)).unwrap());
        }
        (root, ids)
    }

    fn forms(root: &Root) -> Vec<String> {
        root.descendants()
            .into_iter()
            .map(|id| root[id].form.clone())
            .collect()
    }

    fn assert_ords_dense(root: &Root) {
        let ords: Vec<usize> = root.descendants().iter().map(|&id| root[id].ord()).collect();
        assert_eq!(ords, (1..=root.len()).collect::<Vec<_>>());
        root.validate().unwrap();
    }

    #[test]
    fn test_create_child_assigns_next_ord() {
        let (root, ids) = build(&["The", "dog", "barks"]);
        assert_eq!(root.len(), 3);
        assert_eq!(root[ids[2]].ord(), 3);
        assert_eq!(root.parent(ids[0]).unwrap(), Some(root.root_id()));
        assert_eq!(root.children(ids[0]).unwrap(), vec![ids[1], ids[2]]);
        assert_ords_dense(&root);
    }

    #[test]
    fn test_compute_text() {
        let (mut root, ids) = build(&["The", "dog", "barks", "."]);
        assert_eq!(root.compute_text(true), "The dog barks .");

        root.node_mut(ids[2]).unwrap().misc.set("SpaceAfter", Some("No"));
        assert_eq!(root.compute_text(true), "The dog barks.");
        assert_eq!(root.compute_text(true), root.compute_text(true));
    }

    #[test]
    fn test_compute_text_spaces_after() {
        let (mut root, ids) = build(&["a", "b", "c"]);
        root.node_mut(ids[0]).unwrap().misc.set("SpacesAfter", Some("\\s\\s"));
        root.node_mut(ids[1]).unwrap().misc.set("SpacesAfter", Some("\\n"));
        assert_eq!(root.compute_text(true), "a  b\nc");
    }

    #[test]
    fn test_get_sentence_fallbacks() {
        let (mut root, _) = build(&["Hi", "!"]);
        assert_eq!(root.get_sentence(TextFallback::Detokenize).unwrap(), "Hi !");
        assert_eq!(root.get_sentence(TextFallback::Empty).unwrap(), "");
        assert!(matches!(
            root.get_sentence(TextFallback::Fail),
            Err(Error::Precondition(_))
        ));

        root.text = Some("Hi!".to_string());
        assert_eq!(root.get_sentence(TextFallback::Fail).unwrap(), "Hi!");
        assert!("bogus".parse::<TextFallback>().is_err());
    }

    #[test]
    fn test_shift_before_and_after() {
        let (mut root, ids) = build(&["a", "b", "c", "d"]);
        root.shift_before_node(ids[3], ids[0]).unwrap();
        assert_eq!(forms(&root), ["d", "a", "b", "c"]);
        assert_ords_dense(&root);

        root.shift_after_node(ids[0], ids[2]).unwrap();
        assert_eq!(forms(&root), ["d", "b", "c", "a"]);
        assert_ords_dense(&root);

        // Parents are untouched by reordering
        assert_eq!(root.parent(ids[3]).unwrap(), Some(ids[0]));
        assert!(root.precedes(ids[3], ids[0]).unwrap());
    }

    #[test]
    fn test_shift_subtree() {
        let (mut root, ids) = build(&["a", "b", "c", "d"]);
        // d <- c
        root.set_parent(ids[2], ids[3]).unwrap();
        root.shift_subtree_before_node(ids[3], ids[1]).unwrap();
        assert_eq!(forms(&root), ["a", "c", "d", "b"]);
        assert_ords_dense(&root);

        let err = root.shift_subtree_after_node(ids[3], ids[2]);
        assert!(matches!(err, Err(Error::StructuralIntegrity(_))));
    }

    #[test]
    fn test_shift_cannot_split_mwt() {
        let (mut root, ids) = build(&["x", "de", "el", "y"]);
        root.create_multiword_token(&[ids[1], ids[2]], "del").unwrap();

        let err = root.shift_after_node(ids[3], ids[1]);
        assert!(matches!(err, Err(Error::StructuralIntegrity(_))));
        // Rolled back
        assert_eq!(forms(&root), ["x", "de", "el", "y"]);
        assert_ords_dense(&root);

        let err = root.shift_before_node(ids[1], ids[0]);
        assert!(err.is_err());
        assert_eq!(forms(&root), ["x", "de", "el", "y"]);

        // Moving past the whole token is fine
        root.shift_after_node(ids[0], ids[2]).unwrap();
        assert_eq!(forms(&root), ["de", "el", "x", "y"]);
        assert_ords_dense(&root);
    }

    #[test]
    fn test_swapping_inside_mwt_resorts_words() {
        let (mut root, ids) = build(&["da", "me", "lo"]);
        let mwt = root.create_multiword_token(&ids, "dámelo").unwrap();
        root.shift_after_node(ids[1], ids[2]).unwrap();
        assert_eq!(
            root.multiword_token(mwt).unwrap().words(),
            &[ids[0], ids[2], ids[1]]
        );
        assert_ords_dense(&root);
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let (mut root, ids) = build(&["a", "b", "c"]);
        root.set_parent(ids[2], ids[1]).unwrap();

        let err = root.set_parent(ids[1], ids[2]);
        assert!(matches!(err, Err(Error::StructuralIntegrity(_))));
        assert!(root.set_parent(ids[1], ids[1]).is_err());
        assert!(root.set_parent(root.root_id(), ids[1]).is_err());
        root.validate().unwrap();
    }

    #[test]
    fn test_set_parent_rejects_other_tree() {
        let (mut first, ids) = build(&["a", "b"]);
        let (second, other) = build(&["c"]);
        let err = first.set_parent(ids[1], other[0]);
        assert!(matches!(err, Err(Error::StructuralIntegrity(_))));
        assert!(second.node(ids[0]).is_err());
    }

    #[test]
    fn test_remove_rehang() {
        let (mut root, ids) = build(&["a", "b", "c", "d"]);
        // b <- c, b <- d
        root.set_parent(ids[2], ids[1]).unwrap();
        root.set_parent(ids[3], ids[1]).unwrap();

        root.remove(ids[1], OrphanPolicy::Rehang).unwrap();
        assert_eq!(root.parent(ids[2]).unwrap(), Some(ids[0]));
        assert_eq!(root.parent(ids[3]).unwrap(), Some(ids[0]));
        assert_eq!(forms(&root), ["a", "c", "d"]);
        assert!(root.node(ids[1]).is_err());
        assert_ords_dense(&root);
    }

    #[test]
    fn test_remove_policies() {
        let (mut root, ids) = build(&["a", "b", "c"]);
        root.set_parent(ids[2], ids[1]).unwrap();

        let err = root.remove(ids[1], OrphanPolicy::Refuse);
        assert!(matches!(err, Err(Error::StructuralIntegrity(_))));
        assert_eq!(root.len(), 3);

        root.remove(ids[1], OrphanPolicy::ReattachToRoot).unwrap();
        assert_eq!(root.parent(ids[2]).unwrap(), Some(root.root_id()));
        assert!(root.syntactic_root().is_err());

        let (mut root, ids) = build(&["a", "b", "c"]);
        root.set_parent(ids[2], ids[1]).unwrap();
        root.remove(ids[1], OrphanPolicy::RemoveSubtree).unwrap();
        assert_eq!(forms(&root), ["a"]);
        assert_ords_dense(&root);

        // Leaves go with any policy
        let (mut root, ids) = build(&["a", "b"]);
        root.remove(ids[1], OrphanPolicy::Refuse).unwrap();
        assert_eq!(root.len(), 1);

        assert_eq!("rehang".parse::<OrphanPolicy>().unwrap(), OrphanPolicy::Rehang);
        assert!(matches!(
            "orphan".parse::<OrphanPolicy>(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_remove_word_of_mwt() {
        let (mut root, ids) = build(&["a", "de", "el", "b"]);
        let mwt = root.create_multiword_token(&[ids[1], ids[2]], "del").unwrap();
        root.token_misc_mut(Token::Multiword(mwt))
            .unwrap()
            .set("SpaceAfter", Some("No"));
        root.remove(ids[2], OrphanPolicy::Refuse).unwrap();

        // "de" is left alone and takes over the token's spacing
        assert!(root.multiword_token(mwt).is_err());
        assert!(root.multiword_tokens().is_empty());
        assert_eq!(root[ids[1]].multiword_token(), None);
        assert!(!root[ids[1]].space_after());
        assert_eq!(root.compute_text(true), "a deb");
        assert_ords_dense(&root);
    }

    #[test]
    fn test_remove_subtree_of_three_word_mwt() {
        let (mut root, ids) = build(&["a", "x", "y", "z"]);
        let mwt = root.create_multiword_token(&ids[1..], "xyz").unwrap();
        root.remove(ids[3], OrphanPolicy::Refuse).unwrap();
        assert_eq!(root.multiword_token(mwt).unwrap().words(), &ids[1..3]);
        assert_ords_dense(&root);
    }

    #[test]
    fn test_single_word_mwt_rejected() {
        let (mut root, ids) = build(&["a", "b"]);
        assert!(matches!(
            root.create_multiword_token(&[ids[0]], "x"),
            Err(Error::StructuralIntegrity(_))
        ));
        assert!(matches!(
            root.create_multiword_token(&[ids[1], ids[1]], "x"),
            Err(Error::StructuralIntegrity(_))
        ));
        assert!(root.multiword_tokens().is_empty());

        // A single word that already belongs to a token is spliced into it
        let mwt = root.create_multiword_token(&ids, "ab").unwrap();
        let respliced = root.create_multiword_token(&[ids[0]], "AB").unwrap();
        assert!(root.multiword_token(mwt).is_err());
        assert_eq!(root.multiword_token(respliced).unwrap().words(), &ids[..]);
        root.validate().unwrap();
    }

    #[test]
    fn test_create_child_at() {
        let (mut root, ids) = build(&["a", "c"]);
        let b = root
            .create_child_at(ids[0], NodeAttrs::new("b"), Placement::Before(ids[1]))
            .unwrap();
        assert_eq!(forms(&root), ["a", "b", "c"]);
        assert_eq!(root[b].ord(), 2);

        root.create_multiword_token(&[ids[0], b], "ab").unwrap();
        let err = root.create_child_at(ids[0], NodeAttrs::new("x"), Placement::After(ids[0]));
        assert!(err.is_err());
        assert_eq!(forms(&root), ["a", "b", "c"]);
        assert_ords_dense(&root);
    }

    #[test]
    fn test_create_mwt_moves_space_after() {
        let (mut root, ids) = build(&["de", "el", "x"]);
        root.node_mut(ids[1]).unwrap().misc.set("SpaceAfter", Some("No"));
        let mwt = root.create_multiword_token(&[ids[0], ids[1]], "del").unwrap();

        assert_eq!(root.multiword_token(mwt).unwrap().misc.value("SpaceAfter"), Some("No"));
        assert!(root[ids[1]].space_after());
        assert_eq!(root.compute_text(true), "delx");
        assert_eq!(root.compute_text(false), "de el x");
        assert_eq!(root[ids[0]].multiword_token(), Some(mwt));

        root.remove_multiword_token(mwt).unwrap();
        assert!(!root[ids[1]].space_after());
        assert_eq!(root[ids[0]].multiword_token(), None);
        assert_eq!(root.compute_text(true), "de elx");
    }

    #[test]
    fn test_create_mwt_requires_contiguity() {
        let (mut root, ids) = build(&["a", "b", "c"]);
        let err = root.create_multiword_token(&[ids[0], ids[2]], "ac");
        assert!(matches!(err, Err(Error::StructuralIntegrity(_))));
        assert!(root.create_multiword_token(&[], "x").is_err());
        assert!(root.multiword_tokens().is_empty());
    }

    #[test]
    fn test_create_mwt_splices_old_token() {
        // "dámelo" was split as dá + melo; melo is now split into me + lo
        let (mut root, ids) = build(&["dá", "melo", "ya"]);
        let old = root.create_multiword_token(&[ids[0], ids[1]], "dámelo").unwrap();
        root.node_mut(ids[1]).unwrap().form = "me".to_string();
        let lo = root
            .create_child_at(ids[0], NodeAttrs::new("lo"), Placement::After(ids[1]))
            .unwrap();

        let new = root.create_multiword_token(&[ids[1], lo], "dámelo").unwrap();
        let words = root.multiword_token(new).unwrap().words().to_vec();
        assert_eq!(words, vec![ids[0], ids[1], lo]);
        assert!(root.multiword_token(old).is_err());
        for id in root.descendants() {
            assert_ne!(root[id].multiword_token(), Some(old));
        }
        assert_ords_dense(&root);
    }

    #[test]
    fn test_create_mwt_replacing_all_old_words() {
        // Old 3-word token replaced by two new words
        let (mut root, ids) = build(&["x", "a", "b", "c"]);
        let old = root.create_multiword_token(&ids[1..], "abc").unwrap();
        let p = root
            .create_child_at(ids[0], NodeAttrs::new("p"), Placement::After(ids[3]))
            .unwrap();
        let q = root
            .create_child_at(ids[0], NodeAttrs::new("q"), Placement::After(p))
            .unwrap();
        for &gone in &ids[1..] {
            root.remove(gone, OrphanPolicy::Refuse).unwrap();
        }
        assert!(root.multiword_token(old).is_err());

        let new = root.create_multiword_token(&[p, q], "abc").unwrap();
        assert_eq!(root.multiword_token(new).unwrap().words(), &[p, q]);
        assert_ords_dense(&root);
    }

    #[test]
    fn test_token_descendants() {
        let (mut root, ids) = build(&["vamos", "a", "el", "mar"]);
        let mwt = root.create_multiword_token(&[ids[1], ids[2]], "al").unwrap();
        let tokens = root.token_descendants();
        assert_eq!(
            tokens,
            vec![Token::Word(ids[0]), Token::Multiword(mwt), Token::Word(ids[3])]
        );
        assert!(tokens[1].is_mwt());
        assert_eq!(root.token_form(tokens[1]).unwrap(), "al");
        assert_eq!(root.token_words(tokens[1]).unwrap(), vec![ids[1], ids[2]]);
        assert_eq!(root.compute_text(true), "vamos al mar");
    }

    #[test]
    fn test_deps_follow_renumbering() {
        let (mut root, ids) = build(&["a", "b", "c"]);
        root.set_raw_deps(ids[1], "1:nsubj|0:root").unwrap();
        root.shift_before_node(ids[0], ids[2]).unwrap();

        assert_eq!(root.raw_deps(ids[1]).unwrap(), "0:root|2:nsubj");
        let deps = root.deps(ids[1]).unwrap();
        assert!(deps.contains(&Link::new(ids[0], "nsubj")));

        root.remove(ids[0], OrphanPolicy::Rehang).unwrap();
        assert_eq!(root.raw_deps(ids[1]).unwrap(), "0:root");
    }

    #[test]
    fn test_bad_raw_deps_block_reordering() {
        let (mut root, ids) = build(&["a", "b"]);
        root.set_raw_deps(ids[1], "7:obj").unwrap();
        assert!(root.shift_before_node(ids[1], ids[0]).is_err());
        assert_eq!(forms(&root), ["a", "b"]);
    }

    #[test]
    fn test_navigation() {
        let (mut root, ids) = build(&["a", "b", "c"]);
        root.set_parent(ids[2], ids[1]).unwrap();

        assert_eq!(root.prev_node(ids[0]).unwrap(), None);
        assert_eq!(root.next_node(ids[0]).unwrap(), Some(ids[1]));
        assert_eq!(root.next_node(ids[2]).unwrap(), None);
        assert_eq!(root.descendants_of(ids[0]).unwrap(), vec![ids[1], ids[2]]);
        assert_eq!(root.siblings(ids[1]).unwrap(), Vec::<NodeId>::new());
        assert!(root.is_descendant_of(ids[2], ids[0]).unwrap());
        assert!(!root.is_descendant_of(ids[0], ids[2]).unwrap());
        assert_eq!(root.syntactic_root().unwrap(), ids[0]);
        assert_eq!(root.address_of(ids[1]).unwrap(), "#2");
    }

    #[test]
    fn test_copy_tree_is_independent() {
        let (mut root, ids) = build(&["a", "b"]);
        root.create_multiword_token(&ids, "ab").unwrap();
        let mut copy = root.copy_tree();
        copy.validate().unwrap();
        assert_ne!(copy.id(), root.id());

        let copied = copy.descendants();
        copy.node_mut(copied[0]).unwrap().form = "z".to_string();
        assert_eq!(root[ids[0]].form, "a");
        assert!(root.node(copied[0]).is_err());
    }

    #[test]
    fn test_space_escapes() {
        assert_eq!(unescape_spaces("\\s\\t\\n\\p\\\\"), " \t\n|\\");
        assert_eq!(escape_spaces(" \t\n|\\"), "\\s\\t\\n\\p\\\\");
    }

    #[test]
    fn test_add_comment() {
        let mut root = Root::new("");
        root.add_comment("first");
        root.add_comment("second\n");
        assert_eq!(root.comment, "first\nsecond\n");
    }
}
