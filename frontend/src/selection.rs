//! Selected entity keys, independent of what is currently visible.
//!
//! Filtering, sorting and paging never touch the set; only an explicit
//! deselect or the entity's deletion removes a key.

use std::collections::BTreeSet;

use serde::Serialize;

/// Tri-state of the "select page" control.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MasterCheckState {
    #[default]
    Unchecked,
    Checked,
    Indeterminate,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    selected: BTreeSet<String>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one key; returns the new state.
    pub fn toggle(&mut self, key: &str) -> bool {
        if self.selected.remove(key) {
            false
        } else {
            self.selected.insert(key.to_string());
            true
        }
    }

    pub fn set(&mut self, key: &str, selected: bool) {
        if selected {
            self.selected.insert(key.to_string());
        } else {
            self.selected.remove(key);
        }
    }

    pub fn set_many<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>, selected: bool) {
        for key in keys {
            self.set(key, selected);
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.selected.remove(key)
    }

    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.contains(key)
    }

    pub fn count(&self) -> usize {
        self.selected.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.selected.iter().map(String::as_str)
    }

    /// Computed from the rendered page only.
    pub fn master_state(&self, page_keys: &[&str]) -> MasterCheckState {
        let selected = page_keys.iter().filter(|key| self.is_selected(key)).count();
        match selected {
            0 => MasterCheckState::Unchecked,
            n if n == page_keys.len() => MasterCheckState::Checked,
            _ => MasterCheckState::Indeterminate,
        }
    }

    /// Master control click: a fully selected page is deselected, anything
    /// else selects every row of the page. Rows on other pages are untouched.
    pub fn toggle_page(&mut self, page_keys: &[&str]) -> MasterCheckState {
        let select = self.master_state(page_keys) != MasterCheckState::Checked;
        self.set_many(page_keys.iter().copied(), select);
        self.master_state(page_keys)
    }
}
