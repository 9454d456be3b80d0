//! Bundles: parallel trees of one sentence, at most one per zone

use crate::error::{Error, Result};
use crate::tree::Root;
use once_cell::sync::Lazy;
use regex::Regex;

static VALID_ZONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z-]*(_[A-Za-z0-9-]+)?$").expect("valid zone regex"));

#[derive(Debug, Default)]
pub struct Bundle {
    bundle_id: String,
    /// 1-based position within the document, 0 when detached
    pub(crate) number: usize,
    trees: Vec<Root>,
}

impl Bundle {
    pub fn new(bundle_id: &str) -> Self {
        Self {
            bundle_id: bundle_id.to_string(),
            number: 0,
            trees: Vec::new(),
        }
    }

    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub fn number(&self) -> usize {
        self.number
    }

    /// Rename the bundle; every tree's address follows
    pub fn set_bundle_id(&mut self, bundle_id: &str) {
        self.bundle_id = bundle_id.to_string();
        for tree in &mut self.trees {
            tree.set_bundle_id(bundle_id);
        }
    }

    pub fn trees(&self) -> &[Root] {
        &self.trees
    }

    pub fn trees_mut(&mut self) -> &mut [Root] {
        &mut self.trees
    }

    fn check_zone(&self, zone: &str) -> Result<()> {
        if !VALID_ZONE.is_match(zone) {
            return Err(Error::configuration(format!("{zone:?} is not a valid zone name")));
        }
        if self.has_tree(zone) {
            return Err(Error::structural(format!(
                "bundle {} already contains a tree with zone {zone:?}",
                self.bundle_id
            )));
        }
        Ok(())
    }

    /// Create an empty tree in a new zone
    pub fn create_tree(&mut self, zone: &str) -> Result<&mut Root> {
        self.add_tree(Root::new(zone))
    }

    /// Attach an existing tree, keeping its zone
    pub fn add_tree(&mut self, mut tree: Root) -> Result<&mut Root> {
        self.check_zone(tree.zone())?;
        tree.set_bundle_id(&self.bundle_id);
        self.trees.push(tree);
        let last = self.trees.len() - 1;
        Ok(&mut self.trees[last])
    }

    pub fn has_tree(&self, zone: &str) -> bool {
        self.trees.iter().any(|tree| tree.zone() == zone)
    }

    pub fn get_tree(&self, zone: &str) -> Result<&Root> {
        self.trees
            .iter()
            .find(|tree| tree.zone() == zone)
            .ok_or_else(|| self.missing_zone(zone))
    }

    pub fn get_tree_mut(&mut self, zone: &str) -> Result<&mut Root> {
        let missing = self.missing_zone(zone);
        self.trees
            .iter_mut()
            .find(|tree| tree.zone() == zone)
            .ok_or(missing)
    }

    fn missing_zone(&self, zone: &str) -> Error {
        Error::precondition(format!(
            "bundle {} has no tree with zone {zone:?}",
            self.bundle_id
        ))
    }

    /// Detach and return the tree of `zone`
    pub fn remove_tree(&mut self, zone: &str) -> Result<Root> {
        let position = self
            .trees
            .iter()
            .position(|tree| tree.zone() == zone)
            .ok_or_else(|| self.missing_zone(zone))?;
        let mut tree = self.trees.remove(position);
        tree.set_bundle_id("");
        Ok(tree)
    }

    /// Move the tree of `zone` to another zone name
    pub fn rename_zone(&mut self, zone: &str, new_zone: &str) -> Result<()> {
        if zone == new_zone {
            return Ok(());
        }
        self.check_zone(new_zone)?;
        self.get_tree_mut(zone)?.set_zone(new_zone);
        Ok(())
    }
}
