//! Explicit view state threaded through render calls.

use crate::view::tree::OwnershipNode;

/// Zoom position inside the ownership tree and the active scenario.
///
/// The zoom path is a list of node keys below the root. Paths that no longer
/// resolve (for example after a round was deleted) fall back to the deepest
/// node that still exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    zoom_path: Vec<String>,
    selected_scenario: Option<String>,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zoom_path(&self) -> &[String] {
        &self.zoom_path
    }

    /// Zooms one level into the child with `key`.
    ///
    /// Returns `false` and leaves the state unchanged when the focused node
    /// has no such child.
    pub fn zoom_into(&mut self, tree: &OwnershipNode, key: &str) -> bool {
        let focused = self.focused_node(tree);
        if focused.child(key).is_none() {
            return false;
        }
        self.zoom_path = self.resolved_path(tree);
        self.zoom_path.push(key.to_string());
        true
    }

    /// Moves one level up; a no-op at the root.
    pub fn zoom_out(&mut self) {
        self.zoom_path.pop();
    }

    /// Returns to the root.
    pub fn reset_zoom(&mut self) {
        self.zoom_path.clear();
    }

    /// Returns the deepest node of the zoom path that exists in `tree`.
    pub fn focused_node<'a>(&self, tree: &'a OwnershipNode) -> &'a OwnershipNode {
        let mut node = tree;
        for key in &self.zoom_path {
            match node.child(key) {
                Some(child) => node = child,
                None => break,
            }
        }
        node
    }

    fn resolved_path(&self, tree: &OwnershipNode) -> Vec<String> {
        let mut node = tree;
        let mut path = Vec::new();
        for key in &self.zoom_path {
            match node.child(key) {
                Some(child) => {
                    path.push(key.clone());
                    node = child;
                }
                None => break,
            }
        }
        path
    }

    pub fn selected_scenario(&self) -> Option<&str> {
        self.selected_scenario.as_deref()
    }

    /// Selects a scenario and resets zoom, since node keys differ per table.
    pub fn select_scenario(&mut self, name: Option<String>) {
        if self.selected_scenario != name {
            self.zoom_path.clear();
        }
        self.selected_scenario = name;
    }
}
