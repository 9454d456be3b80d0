//! Syntactic words and the handles that address them
//!
//! Nodes live in the arena of the [`Root`](crate::tree::Root) that owns them.
//! A [`NodeId`] names a node by tree and arena slot; it stays valid across
//! reordering and renumbering, unlike the 1-based `ord`.

use crate::dualdict::DualDict;
use crate::links::Deps;
use crate::mwt::MwtId;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_TREE_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of one tree, unique within the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(u32);

impl TreeId {
    pub(crate) fn fresh() -> Self {
        TreeId(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Handle of a node within its tree. Slot 0 is the virtual root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) tree: TreeId,
    pub(crate) slot: u32,
}

impl NodeId {
    pub(crate) fn new(tree: TreeId, slot: usize) -> Self {
        Self {
            tree,
            slot: slot as u32,
        }
    }

    pub fn tree(&self) -> TreeId {
        self.tree
    }

    /// Whether this is the artificial root (ord 0) of its tree
    pub fn is_root(&self) -> bool {
        self.slot == 0
    }

    pub(crate) fn index(&self) -> usize {
        self.slot as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}n{}", self.tree.0, self.slot)
    }
}

/// Attributes of a node about to be created
#[derive(Debug, Clone, Default)]
pub struct NodeAttrs {
    pub form: String,
    pub lemma: String,
    pub upos: String,
    pub xpos: String,
    pub feats: DualDict,
    pub deprel: String,
    pub misc: DualDict,
}

impl NodeAttrs {
    pub fn new(form: &str) -> Self {
        Self {
            form: form.to_string(),
            ..Self::default()
        }
    }

    pub fn lemma(mut self, lemma: &str) -> Self {
        self.lemma = lemma.to_string();
        self
    }

    pub fn upos(mut self, upos: &str) -> Self {
        self.upos = upos.to_string();
        self
    }

    pub fn xpos(mut self, xpos: &str) -> Self {
        self.xpos = xpos.to_string();
        self
    }

    pub fn deprel(mut self, deprel: &str) -> Self {
        self.deprel = deprel.to_string();
        self
    }

    pub fn feats(mut self, feats: &str) -> Self {
        self.feats = DualDict::from_string(feats);
        self
    }

    pub fn misc(mut self, misc: &str) -> Self {
        self.misc = DualDict::from_string(misc);
        self
    }
}

/// A syntactic word
///
/// Annotation fields are public. Structural fields (`ord`, parent, children,
/// multiword token) are read through accessors and changed only through
/// [`Root`](crate::tree::Root) operations, which keep them consistent.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) ord: usize,
    pub form: String,
    pub lemma: String,
    pub upos: String,
    pub xpos: String,
    pub feats: DualDict,
    pub deprel: String,
    pub misc: DualDict,
    pub(crate) deps: Deps,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) mwt: Option<MwtId>,
}

impl Node {
    pub(crate) fn sentinel() -> Self {
        Self::from_attrs(NodeAttrs::default(), 0, None)
    }

    pub(crate) fn from_attrs(attrs: NodeAttrs, ord: usize, parent: Option<NodeId>) -> Self {
        Self {
            ord,
            form: attrs.form,
            lemma: attrs.lemma,
            upos: attrs.upos,
            xpos: attrs.xpos,
            feats: attrs.feats,
            deprel: attrs.deprel,
            misc: attrs.misc,
            deps: Deps::default(),
            parent,
            children: Vec::new(),
            mwt: None,
        }
    }

    /// 1-based word-order position (0 for the virtual root)
    pub fn ord(&self) -> usize {
        self.ord
    }

    /// Parent node; `None` only for the virtual root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Multiword token this word belongs to
    pub fn multiword_token(&self) -> Option<MwtId> {
        self.mwt
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Universal part of the relation (`nsubj` for `nsubj:pass`)
    pub fn udeprel(&self) -> &str {
        match self.deprel.split_once(':') {
            Some((udeprel, _)) => udeprel,
            None => &self.deprel,
        }
    }

    /// Language-specific subtype (`pass` for `nsubj:pass`), empty if none
    pub fn sdeprel(&self) -> &str {
        match self.deprel.split_once(':') {
            Some((_, sdeprel)) => sdeprel,
            None => "",
        }
    }

    /// False when MISC carries `SpaceAfter=No`
    pub fn space_after(&self) -> bool {
        self.misc.value("SpaceAfter") != Some("No")
    }
}
