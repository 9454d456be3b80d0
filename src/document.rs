//! Documents: an ordered list of bundles plus document-level registries

use crate::bundle::Bundle;
use crate::coref::CorefEntity;
use crate::node::{Node, NodeId};
use crate::tree::Root;
use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct Document {
    bundles: Vec<Bundle>,
    /// Free-form document metadata (e.g. `loaded_from`, `global.Entity`)
    pub meta: FxHashMap<String, String>,
    pub(crate) entities: Vec<CorefEntity>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bundles(&self) -> &[Bundle] {
        &self.bundles
    }

    pub fn bundles_mut(&mut self) -> &mut [Bundle] {
        &mut self.bundles
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Append an empty bundle with a fresh numeric id
    pub fn create_bundle(&mut self) -> &mut Bundle {
        let id = self.next_bundle_id();
        self.add_bundle(Bundle::new(&id))
    }

    /// One past the largest numeric bundle id in use
    pub(crate) fn next_bundle_id(&self) -> String {
        let largest = self
            .bundles
            .iter()
            .filter_map(|b| b.bundle_id().parse::<usize>().ok())
            .max()
            .unwrap_or(0);
        (largest + 1).to_string()
    }

    /// Append an existing bundle
    pub fn add_bundle(&mut self, mut bundle: Bundle) -> &mut Bundle {
        bundle.number = self.bundles.len() + 1;
        self.bundles.push(bundle);
        let last = self.bundles.len() - 1;
        &mut self.bundles[last]
    }

    /// Detach the bundle at `index`; later bundles are renumbered
    pub fn remove_bundle(&mut self, index: usize) -> Option<Bundle> {
        if index >= self.bundles.len() {
            return None;
        }
        let mut bundle = self.bundles.remove(index);
        bundle.number = 0;
        for (i, b) in self.bundles.iter_mut().enumerate().skip(index) {
            b.number = i + 1;
        }
        Some(bundle)
    }

    /// All trees, bundle by bundle
    pub fn trees(&self) -> impl Iterator<Item = &Root> {
        self.bundles.iter().flat_map(|bundle| bundle.trees().iter())
    }

    pub fn trees_mut(&mut self) -> impl Iterator<Item = &mut Root> {
        self.bundles
            .iter_mut()
            .flat_map(|bundle| bundle.trees_mut().iter_mut())
    }

    /// Tree that owns `id`
    pub fn tree_of(&self, id: NodeId) -> Option<&Root> {
        self.trees().find(|tree| tree.id() == id.tree())
    }

    pub fn tree_of_mut(&mut self, id: NodeId) -> Option<&mut Root> {
        self.trees_mut().find(|tree| tree.id() == id.tree())
    }

    /// Index of the bundle whose trees own `id`
    pub fn bundle_index_of(&self, id: NodeId) -> Option<usize> {
        self.bundles
            .iter()
            .position(|bundle| bundle.trees().iter().any(|tree| tree.id() == id.tree()))
    }

    /// Live node behind `id`, wherever it is
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.tree_of(id).and_then(|tree| tree.get_node(id))
    }
}
