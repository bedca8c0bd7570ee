use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::core::{AttrPatch, Node, Selection};

pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertText {
        #[serde(default)]
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        #[serde(default)]
        path: Path,
        range: Range<usize>,
    },
    InsertNode {
        #[serde(default)]
        path: Path,
        node: Node,
    },
    RemoveNode {
        #[serde(default)]
        path: Path,
    },
    SetNodeAttrs {
        #[serde(default)]
        path: Path,
        patch: AttrPatch,
    },
}

fn default_add_to_history() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// When false the edit is applied without an undo record. Earlier undo
    /// records are not remapped, so such edits must keep existing paths stable.
    #[serde(default = "default_add_to_history")]
    pub add_to_history: bool,
}

impl Default for TransactionMeta {
    fn default() -> Self {
        Self {
            source: None,
            add_to_history: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_after: Option<Selection>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            selection_after: None,
            meta: TransactionMeta::default(),
        }
    }

    pub fn selection_after(mut self, selection_after: Selection) -> Self {
        self.selection_after = Some(selection_after);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }

    pub fn add_to_history(mut self, add_to_history: bool) -> Self {
        self.meta.add_to_history = add_to_history;
        self
    }
}

/// A fragment of content on its way into the document, e.g. from the clipboard.
///
/// `open_start` and `open_end` count how many node levels at each edge were cut
/// open when the fragment was taken from its source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    #[serde(default)]
    pub content: Vec<Node>,
    #[serde(default)]
    pub open_start: usize,
    #[serde(default)]
    pub open_end: usize,
}

impl Slice {
    pub fn new(content: Vec<Node>, open_start: usize, open_end: usize) -> Self {
        Self {
            content,
            open_start,
            open_end,
        }
    }

    pub fn closed(content: Vec<Node>) -> Self {
        Self::new(content, 0, 0)
    }
}
