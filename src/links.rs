//! Enhanced dependencies (the DEPS column)
//!
//! DEPS is stored as `head:deprel|head:deprel` with heads given by ord. The
//! string is kept as read until somebody needs the structured links; the tree
//! resolves every raw string before it renumbers, so ords in a raw string are
//! never stale.

use crate::error::{Error, Result};
use crate::node::NodeId;
use atoi::FromRadix10Checked;

/// A secondary (non-tree) edge to `parent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub parent: NodeId,
    pub deprel: String,
}

impl Link {
    pub fn new(parent: NodeId, deprel: &str) -> Self {
        Self {
            parent,
            deprel: deprel.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Deps {
    Raw(String),
    Parsed(Vec<Link>),
}

impl Default for Deps {
    fn default() -> Self {
        Deps::Parsed(Vec::new())
    }
}

impl Deps {
    pub(crate) fn from_raw(raw: &str) -> Self {
        if raw.is_empty() || raw == "_" {
            Deps::default()
        } else {
            Deps::Raw(raw.to_string())
        }
    }
}

/// Parse a 1-based ord; rejects signs, decimals and trailing garbage
pub(crate) fn parse_ord(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    match usize::from_radix_10_checked(bytes) {
        (Some(n), used) if used == bytes.len() && used > 0 => Some(n),
        _ => None,
    }
}

/// Resolve a raw DEPS string; `resolve` maps an ord (0 = virtual root) to a node
pub(crate) fn parse_deps(raw: &str, resolve: impl Fn(usize) -> Option<NodeId>) -> Result<Vec<Link>> {
    if raw.is_empty() || raw == "_" {
        return Ok(Vec::new());
    }
    let mut links = Vec::new();
    for pair in raw.split('|') {
        let Some((head, deprel)) = pair.split_once(':') else {
            return Err(Error::structural(format!(
                "malformed enhanced dependency {pair:?}"
            )));
        };
        if head.contains('.') {
            return Err(Error::structural(format!(
                "enhanced dependency {pair:?} points to an empty node, which is not supported"
            )));
        }
        let parent = parse_ord(head).and_then(&resolve).ok_or_else(|| {
            Error::structural(format!("enhanced dependency {pair:?} has no such head"))
        })?;
        links.push(Link::new(parent, deprel));
    }
    Ok(links)
}

/// Serialize links by current ords, sorted by (ord, deprel)
pub(crate) fn serialize_deps(links: &[Link], ord_of: impl Fn(NodeId) -> usize) -> String {
    if links.is_empty() {
        return "_".to_string();
    }
    let mut pairs: Vec<(usize, &str)> = links
        .iter()
        .map(|link| (ord_of(link.parent), link.deprel.as_str()))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(ord, deprel)| format!("{ord}:{deprel}"))
        .collect::<Vec<_>>()
        .join("|")
}
