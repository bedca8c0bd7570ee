use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ops::{Op, Path, Slice, Transaction};
use crate::plugin::{CommandError, CommandSpec, NodeSpec, PluginRegistry};

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementKind = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        node_ref(self, path)
    }

    /// Every node in the document with its path, in document order.
    pub fn descendants(&self) -> Vec<(Path, &Node)> {
        let mut out = Vec::new();
        collect_descendants(&self.children, &mut Vec::new(), &mut out);
        out
    }

    /// Path of the slot right after the block holding `point`.
    ///
    /// A point with no enclosing block maps to the end of the document.
    pub fn slot_after_block(&self, point: &Point) -> Path {
        let block_path = point.path.split_last().map(|(_, p)| p).unwrap_or(&[]);
        match block_path.split_last() {
            Some((block_ix, parent)) => {
                let mut path = parent.to_vec();
                path.push(block_ix + 1);
                path
            }
            None => vec![self.children.len()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Marks::default(),
        })
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::element("paragraph", vec![Node::text(text)])
    }

    pub fn element(kind: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: kind.into(),
            attrs: Attrs::default(),
            children,
        })
    }

    pub fn void(kind: impl Into<String>, attrs: Attrs) -> Self {
        Node::Void(VoidNode {
            kind: kind.into(),
            attrs,
        })
    }

    pub fn divider() -> Self {
        Node::void("divider", Attrs::default())
    }

    pub fn image(src: impl Into<String>, width: Option<u32>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("src".to_string(), serde_json::Value::String(src.into()));
        if let Some(width) = width {
            attrs.insert("width".to_string(), serde_json::Value::from(width));
        }
        Node::void("image", attrs)
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            Node::Element(el) => Some(&el.kind),
            Node::Void(v) => Some(&v.kind),
            Node::Text(_) => None,
        }
    }

    pub fn attrs(&self) -> Option<&Attrs> {
        match self {
            Node::Element(el) => Some(&el.attrs),
            Node::Void(v) => Some(&v.attrs),
            Node::Text(_) => None,
        }
    }

    /// Descendants of this node with paths relative to it.
    pub fn descendants(&self) -> Vec<(Path, &Node)> {
        let mut out = Vec::new();
        if let Node::Element(el) = self {
            collect_descendants(&el.children, &mut Vec::new(), &mut out);
        }
        out
    }
}

fn collect_descendants<'a>(children: &'a [Node], path: &mut Path, out: &mut Vec<(Path, &'a Node)>) {
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        out.push((path.clone(), node));
        if let Node::Element(el) = node {
            collect_descendants(&el.children, path, out);
        }
        path.pop();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
}

impl VoidNode {
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// `(start, end)` in document order.
    pub fn ordered(&self) -> (Point, Point) {
        let anchor_first = (&self.anchor.path, self.anchor.offset)
            <= (&self.focus.path, self.focus.offset);
        if anchor_first {
            (self.anchor.clone(), self.focus.clone())
        } else {
            (self.focus.clone(), self.anchor.clone())
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Selection,
    pub selection_after: Selection,
}

#[derive(Debug, Default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl EditorConfig {
    fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        self
    }
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    registry: PluginRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Selection,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            doc,
            selection,
            registry,
            config: config.with_defaults(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        };
        editor.normalize_in_place();
        editor
    }

    pub fn with_richtext_plugins() -> Self {
        let doc = Document::new(vec![Node::paragraph("")]);
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, selection, PluginRegistry::richtext())
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.normalize_selection_in_place();
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn node_spec(&self, kind: &str) -> Option<&NodeSpec> {
        self.registry.node_specs().get(kind)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        let (ops, selection_before, selection_after) = self.replay(record);
        self.selection = selection_before.clone();
        self.normalize_in_place();
        self.redo_stack.push(UndoRecord {
            inverse_ops: ops,
            selection_before,
            selection_after,
        });
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        let (ops, selection_before, selection_after) = self.replay(record);
        self.selection = selection_after.clone();
        self.normalize_in_place();
        self.undo_stack.push(UndoRecord {
            inverse_ops: ops,
            selection_before,
            selection_after,
        });
        true
    }

    /// Applies a record's ops and returns the ops that reverse them.
    fn replay(&mut self, record: UndoRecord) -> (Vec<Op>, Selection, Selection) {
        let mut reversed: Vec<Op> = Vec::new();
        for op in record.inverse_ops {
            match self.apply_op(op) {
                Ok(inv) => reversed.push(inv),
                // Stop at the first op that no longer fits the document.
                Err(_) => break,
            }
        }
        reversed.reverse();
        (reversed, record.selection_before, record.selection_after)
    }

    /// Applies a transaction as one atomic edit.
    ///
    /// Either every op and the follow-up normalization lands, or the document
    /// and selection are left as they were.
    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        let doc_before = self.doc.clone();
        let selection_before = self.selection.clone();

        let inverse_ops = match self.apply_ops_and_normalize(tx.ops, tx.selection_after) {
            Ok(inverse_ops) => inverse_ops,
            Err(err) => {
                self.doc = doc_before;
                self.selection = selection_before;
                return Err(err);
            }
        };

        if !tx.meta.add_to_history {
            return Ok(());
        }

        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after: self.selection.clone(),
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }
        Ok(())
    }

    fn apply_ops_and_normalize(
        &mut self,
        ops: Vec<Op>,
        selection_after: Option<Selection>,
    ) -> Result<Vec<Op>, ApplyError> {
        let mut inverse_ops: Vec<Op> = Vec::new();
        for op in ops {
            inverse_ops.push(self.apply_op(op)?);
        }
        if let Some(sel) = selection_after {
            self.selection = sel;
        }

        inverse_ops.append(&mut self.normalize_with_inverse_ops()?);
        inverse_ops.reverse();
        self.normalize_selection_in_place();
        Ok(inverse_ops)
    }

    /// Applies `ops` to a detached copy of the document without normalizing,
    /// mapping `selection` through them.
    pub fn preview_ops(
        &self,
        ops: &[Op],
        mut selection: Selection,
    ) -> Result<(Document, Selection), ApplyError> {
        let mut doc = self.doc.clone();
        for op in ops.iter().cloned() {
            apply_op_to(&mut doc, &mut selection, op)?;
        }
        Ok((doc, selection))
    }

    /// Ops deleting the current selection, and the caret left behind.
    pub fn delete_selection_ops(&self) -> Result<(Vec<Op>, Point), String> {
        delete_range_ops(&self.doc, &self.selection)
    }

    /// Inserts a pasted slice as blocks after the block holding the caret.
    ///
    /// Open slice edges are not joined into the surrounding blocks.
    pub fn insert_slice(&mut self, slice: Slice) -> Result<(), ApplyError> {
        if slice.content.is_empty() {
            return Ok(());
        }
        let slot = self.doc.slot_after_block(&self.selection.focus);
        let (index, parent) = slot
            .split_last()
            .map(|(ix, parent)| (*ix, parent.to_vec()))
            .unwrap_or((0, Vec::new()));

        let ops = slice
            .content
            .into_iter()
            .enumerate()
            .map(|(i, node)| {
                let mut path = parent.clone();
                path.push(index + i);
                Op::InsertNode { path, node }
            })
            .collect();
        self.apply(Transaction::new(ops).source("paste"))
    }

    pub fn run_command(
        &mut self,
        id: &str,
        args: Option<serde_json::Value>,
    ) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        (command.handler)(self, args)
    }

    pub fn commands(&self) -> impl Iterator<Item = &CommandSpec> {
        self.registry.commands().values()
    }

    fn normalize_in_place(&mut self) {
        let _ = self.normalize_with_inverse_ops();
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = self
            .registry
            .normalize_selection(&self.doc, &self.selection);
    }

    fn normalize_with_inverse_ops(&mut self) -> Result<Vec<Op>, ApplyError> {
        let mut inverse_ops: Vec<Op> = Vec::new();
        for _ in 0..self.config.max_normalize_iterations {
            let ops = self.registry.normalize(&self.doc);
            if ops.is_empty() {
                return Ok(inverse_ops);
            }
            for op in ops {
                inverse_ops.push(self.apply_op(op)?);
            }
        }
        Err(ApplyError::NormalizeDidNotConverge)
    }

    fn apply_op(&mut self, op: Op) -> Result<Op, ApplyError> {
        apply_op_to(&mut self.doc, &mut self.selection, op)
    }
}

fn apply_op_to(doc: &mut Document, selection: &mut Selection, op: Op) -> Result<Op, ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            transform_selection_insert_text(selection, &path, offset, text.len());
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start = clamp_to_char_boundary(&text_node.text, range.start);
            let end = clamp_to_char_boundary(&text_node.text, range.end);
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed = text_node.text[start..end].to_string();
            text_node.text.replace_range(start..end, "");
            transform_selection_remove_text(selection, &path, start..end);
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            insert_node(doc, &path, node)?;
            transform_selection_insert_node(selection, &path);
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let removed = remove_node(doc, &path)?;
            transform_selection_remove_node(selection, &path);
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetNodeAttrs { path, patch } => {
            let old = match node_mut(doc, &path)? {
                Node::Element(el) => patch.apply_to(&mut el.attrs),
                Node::Void(v) => patch.apply_to(&mut v.attrs),
                Node::Text(_) => return Err(ApplyError::InvalidPath("Text has no attrs".into())),
            };
            Ok(Op::SetNodeAttrs { path, patch: old })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
}

impl From<PathError> for ApplyError {
    fn from(value: PathError) -> Self {
        ApplyError::InvalidPath(value.0)
    }
}

#[derive(Debug)]
pub struct PathError(pub String);

pub fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}

fn delete_range_ops(doc: &Document, selection: &Selection) -> Result<(Vec<Op>, Point), String> {
    let (start, end) = selection.ordered();
    if start == end {
        return Ok((Vec::new(), start));
    }

    let (start_leaf, start_block) = start
        .path
        .split_last()
        .ok_or_else(|| "Selection start is not in a text node".to_string())?;
    let (end_leaf, end_block) = end
        .path
        .split_last()
        .ok_or_else(|| "Selection end is not in a text node".to_string())?;
    let Some(Node::Element(start_el)) = doc.node(start_block) else {
        return Err("Selection start is not in a text block".into());
    };
    let Some(Node::Element(end_el)) = doc.node(end_block) else {
        return Err("Selection end is not in a text block".into());
    };
    let Some(Node::Text(start_text)) = start_el.children.get(*start_leaf) else {
        return Err("Selection start is not in a text node".into());
    };
    let start_text_len = start_text.text.len();

    let child = |block: &[usize], ix: usize| {
        let mut path = block.to_vec();
        path.push(ix);
        path
    };

    let mut ops: Vec<Op> = Vec::new();

    if start_block == end_block {
        if start_leaf == end_leaf {
            ops.push(Op::RemoveText {
                path: start.path.clone(),
                range: start.offset..end.offset,
            });
        } else {
            let joined_tail = match end_el.children.get(*end_leaf) {
                Some(Node::Text(t)) if t.marks == start_text.marks => {
                    let cut = clamp_to_char_boundary(&t.text, end.offset);
                    Some(t.text[cut..].to_string())
                }
                _ => None,
            };
            // Highest index first so earlier paths stay valid.
            if joined_tail.is_some() {
                ops.push(Op::RemoveNode {
                    path: end.path.clone(),
                });
            } else {
                ops.push(Op::RemoveText {
                    path: end.path.clone(),
                    range: 0..end.offset,
                });
            }
            for ix in (start_leaf + 1..*end_leaf).rev() {
                ops.push(Op::RemoveNode {
                    path: child(start_block, ix),
                });
            }
            ops.push(Op::RemoveText {
                path: start.path.clone(),
                range: start.offset..start_text_len,
            });
            if let Some(text) = joined_tail {
                ops.push(Op::InsertText {
                    path: start.path.clone(),
                    offset: start.offset,
                    text,
                });
            }
        }
        return Ok((ops, start));
    }

    let (start_ix, start_parent) = start_block
        .split_last()
        .ok_or_else(|| "Selection start is not in a block".to_string())?;
    let (end_ix, end_parent) = end_block
        .split_last()
        .ok_or_else(|| "Selection end is not in a block".to_string())?;
    if start_parent != end_parent {
        return Err("Selection spans multiple containers".into());
    }

    let mut carried: Vec<Node> = Vec::new();
    for (ix, node) in end_el.children.iter().enumerate().skip(*end_leaf) {
        match node {
            Node::Text(t) if ix == *end_leaf => {
                let cut = clamp_to_char_boundary(&t.text, end.offset);
                carried.push(Node::Text(TextNode {
                    text: t.text[cut..].to_string(),
                    marks: t.marks.clone(),
                }));
            }
            _ => carried.push(node.clone()),
        }
    }

    for ix in (start_ix + 1..=*end_ix).rev() {
        ops.push(Op::RemoveNode {
            path: child(start_parent, ix),
        });
    }
    for ix in (start_leaf + 1..start_el.children.len()).rev() {
        ops.push(Op::RemoveNode {
            path: child(start_block, ix),
        });
    }
    ops.push(Op::RemoveText {
        path: start.path.clone(),
        range: start.offset..start_text_len,
    });
    // Join text with matching marks directly so normalization has nothing
    // to merge across the caret.
    if let Some(Node::Text(head)) = carried.first() {
        if head.marks == start_text.marks {
            ops.push(Op::InsertText {
                path: start.path.clone(),
                offset: start.offset,
                text: head.text.clone(),
            });
            carried.remove(0);
        }
    }
    for (i, node) in carried.into_iter().enumerate() {
        ops.push(Op::InsertNode {
            path: child(start_block, start_leaf + 1 + i),
            node,
        });
    }

    Ok((ops, start))
}

fn transform_selection_insert_text(
    selection: &mut Selection,
    path: &[usize],
    offset: usize,
    len: usize,
) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset = point.offset.saturating_add(len);
        }
    }
}

fn transform_selection_remove_text(
    selection: &mut Selection,
    path: &[usize],
    range: std::ops::Range<usize>,
) {
    let removed_len = range.end.saturating_sub(range.start);
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path || point.offset <= range.start {
            continue;
        }
        if point.offset >= range.end {
            point.offset = point.offset.saturating_sub(removed_len);
        } else {
            point.offset = range.start;
        }
    }
}

fn transform_selection_insert_node(selection: &mut Selection, path: &[usize]) {
    let Some((index, parent_path)) = path.split_last() else {
        return;
    };
    let depth = parent_path.len();

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() > depth
            && point.path.starts_with(parent_path)
            && point.path[depth] >= *index
        {
            point.path[depth] += 1;
        }
    }
}

fn transform_selection_remove_node(selection: &mut Selection, path: &[usize]) {
    let Some((index, parent_path)) = path.split_last() else {
        return;
    };
    let depth = parent_path.len();

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= depth || !point.path.starts_with(parent_path) {
            continue;
        }
        let ix = point.path[depth];
        if ix > *index {
            point.path[depth] = ix - 1;
        } else if ix == *index {
            // Inside the removed subtree; selection normalization finds the
            // nearest surviving text leaf.
            point.path.truncate(depth + 1);
            point.path[depth] = index.saturating_sub(1);
            point.offset = 0;
        }
    }
}

fn node_ref<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    let (first, rest) = path.split_first()?;
    let mut node = doc.children.get(*first)?;
    for &ix in rest {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Void(_) | Node::Text(_) => return None,
        };
    }
    Some(node)
}

fn children_mut<'a>(doc: &'a mut Document, parent_path: &[usize]) -> Result<&'a mut Vec<Node>, PathError> {
    let mut children = &mut doc.children;
    for (depth, &ix) in parent_path.iter().enumerate() {
        let len = children.len();
        children = match children.get_mut(ix) {
            Some(Node::Element(el)) => &mut el.children,
            Some(_) => return Err(PathError(format!("Non-container node at depth {depth}"))),
            None => {
                return Err(PathError(format!(
                    "Path out of bounds at depth {depth}: {ix} >= {len}"
                )));
            }
        };
    }
    Ok(children)
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    let (index, parent_path) = path
        .split_last()
        .ok_or_else(|| PathError("Empty path".into()))?;
    let children = children_mut(doc, parent_path)?;
    let len = children.len();
    children
        .get_mut(*index)
        .ok_or_else(|| PathError(format!("Path out of bounds: {index} >= {len}")))
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(PathError("Expected Text node".into())),
    }
}

fn insert_node(doc: &mut Document, path: &[usize], node: Node) -> Result<(), PathError> {
    let (index, parent_path) = path
        .split_last()
        .ok_or_else(|| PathError("Empty insert path".into()))?;
    let children = children_mut(doc, parent_path)?;
    if *index > children.len() {
        return Err(PathError(format!(
            "Insert index out of bounds: {index} > {}",
            children.len()
        )));
    }
    children.insert(*index, node);
    Ok(())
}

fn remove_node(doc: &mut Document, path: &[usize]) -> Result<Node, PathError> {
    let (index, parent_path) = path
        .split_last()
        .ok_or_else(|| PathError("Empty remove path".into()))?;
    let children = children_mut(doc, parent_path)?;
    if *index >= children.len() {
        return Err(PathError(format!(
            "Remove index out of bounds: {index} >= {}",
            children.len()
        )));
    }
    Ok(children.remove(*index))
}

/// Attribute edit on an element or void: keys to set, then keys to drop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.set.insert(key.into(), value.into());
        self
    }

    pub fn without(mut self, key: impl Into<String>) -> Self {
        self.remove.push(key.into());
        self
    }

    /// Applies the patch to `attrs` and returns the patch restoring them.
    fn apply_to(&self, attrs: &mut Attrs) -> AttrPatch {
        let mut revert = AttrPatch::default();
        for (key, value) in &self.set {
            match attrs.insert(key.clone(), value.clone()) {
                Some(prev) => {
                    revert.set.insert(key.clone(), prev);
                }
                None => revert.remove.push(key.clone()),
            }
        }
        for key in &self.remove {
            if let Some(prev) = attrs.remove(key) {
                revert.set.insert(key.clone(), prev);
            }
        }
        revert
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descendants_are_in_document_order() {
        let doc = Document::new(vec![
            Node::paragraph("a"),
            Node::element("blockquote", vec![Node::paragraph("b"), Node::divider()]),
        ]);
        let paths: Vec<Path> = doc.descendants().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![
                vec![0],
                vec![0, 0],
                vec![1],
                vec![1, 0],
                vec![1, 0, 0],
                vec![1, 1],
            ]
        );
    }

    #[test]
    fn slot_after_block_for_nested_point() {
        let doc = Document::new(vec![Node::element(
            "blockquote",
            vec![Node::paragraph("a"), Node::paragraph("b")],
        )]);
        let slot = doc.slot_after_block(&Point::new(vec![0, 1, 0], 0));
        assert_eq!(slot, vec![0, 2]);
    }

    #[test]
    fn node_mut_rejects_paths_through_voids() {
        let mut doc = Document::new(vec![Node::divider()]);
        assert!(node_mut(&mut doc, &[0, 0]).is_err());
    }
}
