use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::{Attrs, Document, Editor, Node, Point, Selection};
use crate::ops::{Op, Transaction};

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

type CommandHandler =
    Arc<dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub role: NodeRole,
    pub is_void: bool,
    #[serde(default = "default_draggable")]
    pub draggable: bool,
    pub children: ChildConstraint,
}

fn default_draggable() -> bool {
    true
}

impl NodeSpec {
    pub fn void(kind: impl Into<String>, role: NodeRole) -> Self {
        Self {
            kind: kind.into(),
            role,
            is_void: true,
            draggable: true,
            children: ChildConstraint::None,
        }
    }

    pub fn container(kind: impl Into<String>, children: ChildConstraint) -> Self {
        Self {
            kind: kind.into(),
            role: NodeRole::Block,
            is_void: false,
            draggable: true,
            children,
        }
    }

    pub fn draggable(mut self, draggable: bool) -> Self {
        self.draggable = draggable;
        self
    }
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op>;
}

pub trait PlatePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    node_specs: HashMap<String, NodeSpec>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn PlatePlugin>>) -> Result<Self, String> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    fn core_plugins() -> Vec<Box<dyn PlatePlugin>> {
        vec![
            Box::new(CoreParagraphPlugin),
            Box::new(CoreDividerPlugin),
            Box::new(CoreNormalizePlugin),
            Box::new(CoreCommandsPlugin),
        ]
    }

    pub fn core() -> Self {
        Self::new(Self::core_plugins()).expect("core registry must be valid")
    }

    pub fn richtext() -> Self {
        Self::richtext_with_image_role(NodeRole::Block)
    }

    /// Rich-text registry whose `image` void sits in text (`Inline`) or
    /// between blocks (`Block`).
    pub fn richtext_with_image_role(image_role: NodeRole) -> Self {
        let mut plugins = Self::core_plugins();
        plugins.push(Box::new(BlockquotePlugin));
        plugins.push(Box::new(ImagePlugin { role: image_role }));
        Self::new(plugins).expect("richtext registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn PlatePlugin>) -> Result<(), String> {
        for spec in plugin.node_specs() {
            if self.node_specs.contains_key(&spec.kind) {
                return Err(format!("Duplicate node spec kind: {}", spec.kind));
            }
            self.node_specs.insert(spec.kind.clone(), spec);
        }

        self.normalize_passes.extend(plugin.normalize_passes());

        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(format!("Duplicate command id: {}", cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        Ok(())
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        let mut ops: Vec<Op> = Vec::new();
        for pass in &self.normalize_passes {
            ops.extend(pass.run(doc, self));
        }
        ops
    }

    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        let fallback = first_text_point(&doc.children, &mut Vec::new()).unwrap_or(Point {
            path: vec![0],
            offset: 0,
        });

        let anchor =
            normalize_point_to_existing_text(doc, &selection.anchor).unwrap_or_else(|| {
                normalize_point_to_existing_text(doc, &selection.focus)
                    .unwrap_or_else(|| fallback.clone())
            });
        let focus = normalize_point_to_existing_text(doc, &selection.focus)
            .unwrap_or_else(|| anchor.clone());

        Selection { anchor, focus }
    }

    fn child_constraint(&self, kind: &str) -> Option<ChildConstraint> {
        self.node_specs.get(kind).map(|s| s.children)
    }
}

fn first_text_point(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        let found = match node {
            Node::Text(_) => Some(Point {
                path: path.clone(),
                offset: 0,
            }),
            Node::Element(el) => first_text_point(&el.children, path),
            Node::Void(_) => None,
        };
        path.pop();
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Clamps a point onto the closest text leaf that still exists.
fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                return Some(Point {
                    path: resolved_path,
                    offset: point.offset.min(t.text.len()),
                });
            }
            Node::Element(el) => children = &el.children,
            Node::Void(_) => break,
        }
    }

    match doc.node(&resolved_path)? {
        Node::Text(t) => Some(Point {
            path: resolved_path,
            offset: point.offset.min(t.text.len()),
        }),
        Node::Element(el) => first_text_point(&el.children, &mut resolved_path),
        Node::Void(_) => {
            // Voids hold no caret; fall forward to the next sibling's text.
            let (ix, parent) = resolved_path.split_last()?;
            let siblings = match parent {
                [] => &doc.children,
                _ => match doc.node(parent)? {
                    Node::Element(el) => &el.children,
                    _ => return None,
                },
            };
            let mut path = parent.to_vec();
            siblings
                .iter()
                .enumerate()
                .skip(ix + 1)
                .chain(siblings.iter().enumerate().take(*ix).rev())
                .find_map(|(sibling_ix, node)| {
                    path.truncate(parent.len());
                    path.push(sibling_ix);
                    match node {
                        Node::Text(_) => Some(Point::new(path.clone(), 0)),
                        Node::Element(el) => first_text_point(&el.children, &mut path),
                        Node::Void(_) => None,
                    }
                })
        }
    }
}

struct CoreParagraphPlugin;

impl PlatePlugin for CoreParagraphPlugin {
    fn id(&self) -> &'static str {
        "core.paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::container("paragraph", ChildConstraint::InlineOnly)]
    }
}

struct CoreDividerPlugin;

impl PlatePlugin for CoreDividerPlugin {
    fn id(&self) -> &'static str {
        "core.divider"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::void("divider", NodeRole::Block)]
    }
}

struct CoreNormalizePlugin;

impl PlatePlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureInlineBlocksHaveTextLeaf),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

/// Walks every element whose children are inline-only and hands it to `visit`.
fn for_each_inline_block(
    children: &[Node],
    path: &mut Vec<usize>,
    registry: &PluginRegistry,
    visit: &mut dyn FnMut(&[usize], &[Node]),
) {
    for (ix, node) in children.iter().enumerate() {
        let Node::Element(el) = node else {
            continue;
        };
        path.push(ix);

        let constraint = registry.child_constraint(&el.kind).unwrap_or_else(|| {
            if el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                ChildConstraint::InlineOnly
            } else {
                ChildConstraint::Any
            }
        });
        if constraint == ChildConstraint::InlineOnly {
            visit(path, &el.children);
        } else {
            for_each_inline_block(&el.children, path, registry, visit);
        }

        path.pop();
    }
}

struct EnsureInlineBlocksHaveTextLeaf;

impl NormalizePass for EnsureInlineBlocksHaveTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_inline_only_blocks_have_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for_each_inline_block(&doc.children, &mut Vec::new(), registry, &mut |path: &[usize], children: &[Node]| {
            if children.iter().any(|n| matches!(n, Node::Text(_))) {
                return;
            }
            let mut insert_path = path.to_vec();
            insert_path.push(children.len());
            ops.push(Op::InsertNode {
                path: insert_path,
                node: Node::text(""),
            });
        });
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();
        for_each_inline_block(&doc.children, &mut Vec::new(), registry, &mut |path: &[usize], children: &[Node]| {
            let mut ix = children.len();
            while ix > 0 {
                ix -= 1;
                let Node::Text(right) = &children[ix] else {
                    continue;
                };

                let mut start = ix;
                while let Some(Node::Text(left)) = start.checked_sub(1).and_then(|i| children.get(i)) {
                    if left.marks != right.marks {
                        break;
                    }
                    start -= 1;
                }
                if start == ix {
                    continue;
                }

                let Some(Node::Text(first)) = children.get(start) else {
                    continue;
                };
                let appended: String = children[start + 1..=ix]
                    .iter()
                    .filter_map(|n| match n {
                        Node::Text(t) => Some(t.text.as_str()),
                        _ => None,
                    })
                    .collect();

                if !appended.is_empty() {
                    let mut text_path = path.to_vec();
                    text_path.push(start);
                    ops.push(Op::InsertText {
                        path: text_path,
                        offset: first.text.len(),
                        text: appended,
                    });
                }
                for remove_ix in (start + 1..=ix).rev() {
                    let mut remove_path = path.to_vec();
                    remove_path.push(remove_ix);
                    ops.push(Op::RemoveNode { path: remove_path });
                }
                ix = start;
            }
        });
        ops
    }
}

struct CoreCommandsPlugin;

impl PlatePlugin for CoreCommandsPlugin {
    fn id(&self) -> &'static str {
        "core.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("core.insert_divider", "Insert divider", |editor, _args| {
                let tx = insert_void_block(editor, Node::divider(), "command:core.insert_divider");
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to insert divider: {e}")))
            })
            .description("Insert a divider block and a trailing paragraph.")
            .keywords(["divider", "separator", "hr", "horizontal rule"]),
        ]
    }
}

/// Inserts a block void after the caret's block, followed by an empty
/// paragraph that receives the caret.
pub fn insert_void_block(editor: &Editor, node: Node, source: &str) -> Transaction {
    let void_path = editor.doc().slot_after_block(&editor.selection().focus);
    let mut paragraph_path = void_path.clone();
    if let Some(last) = paragraph_path.last_mut() {
        *last += 1;
    }
    let mut text_path = paragraph_path.clone();
    text_path.push(0);

    Transaction::new(vec![
        Op::InsertNode {
            path: void_path,
            node,
        },
        Op::InsertNode {
            path: paragraph_path,
            node: Node::paragraph(""),
        },
    ])
    .selection_after(Selection::collapsed(Point::new(text_path, 0)))
    .source(source)
}

struct BlockquotePlugin;

impl PlatePlugin for BlockquotePlugin {
    fn id(&self) -> &'static str {
        "blockquote"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::container("blockquote", ChildConstraint::BlockOnly)]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeBlockquoteChildren)]
    }
}

struct NormalizeBlockquoteChildren;

impl NormalizePass for NormalizeBlockquoteChildren {
    fn id(&self) -> &'static str {
        "blockquote.ensure_non_empty"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        fn normalize_container(
            children: &[Node],
            parent_path: &mut Vec<usize>,
            registry: &PluginRegistry,
            ops: &mut Vec<Op>,
        ) {
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    continue;
                };
                parent_path.push(ix);

                if el.kind == "blockquote" && el.children.is_empty() {
                    let mut path = parent_path.clone();
                    path.push(0);
                    ops.push(Op::InsertNode {
                        path,
                        node: Node::paragraph(""),
                    });
                } else if registry.child_constraint(&el.kind) != Some(ChildConstraint::InlineOnly) {
                    normalize_container(&el.children, parent_path, registry, ops);
                }

                parent_path.pop();
            }
        }

        normalize_container(&doc.children, &mut Vec::new(), registry, &mut ops);
        ops
    }
}

struct ImagePlugin {
    role: NodeRole,
}

impl PlatePlugin for ImagePlugin {
    fn id(&self) -> &'static str {
        "image"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::void("image", self.role)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("image.insert", "Insert image", |editor, args| {
                let src = args
                    .as_ref()
                    .and_then(|v| v.get("src"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| CommandError::new("Missing args.src"))?
                    .to_string();

                let mut attrs = Attrs::default();
                attrs.insert("src".to_string(), Value::String(src));
                for key in ["alt", "width"] {
                    if let Some(value) = args.as_ref().and_then(|v| v.get(key)) {
                        attrs.insert(key.to_string(), value.clone());
                    }
                }

                let tx = insert_void_block(editor, Node::void("image", attrs), "command:image.insert");
                editor
                    .apply(tx)
                    .map_err(|e| CommandError::new(format!("Failed to insert image: {e}")))
            })
            .description("Insert an image node (void) after the current block.")
            .keywords(["image", "img", "media", "void"]),
        ]
    }
}
