use plate_core::{Attrs, Node, NodeRole, NodeSpec, PlatePlugin, PluginRegistry, VoidNode};
use serde_json::Value;

use crate::config::UploadOptions;

pub const PLACEHOLDER_KIND: &str = "image_placeholder";
pub const IMAGE_KIND: &str = "image";

pub const UPLOAD_ID_ATTR: &str = "upload_id";
pub const SRC_ATTR: &str = "src";
pub const WIDTH_ATTR: &str = "width";

/// Image-shaped node kinds the upload plugin cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Placeholder,
}

impl MediaKind {
    pub fn of(node: &Node) -> Option<Self> {
        match node {
            Node::Void(v) => Self::of_void(v),
            Node::Element(_) | Node::Text(_) => None,
        }
    }

    pub fn of_void(node: &VoidNode) -> Option<Self> {
        match node.kind.as_str() {
            IMAGE_KIND => Some(MediaKind::Image),
            PLACEHOLDER_KIND => Some(MediaKind::Placeholder),
            _ => None,
        }
    }

    pub fn kind(self) -> &'static str {
        match self {
            MediaKind::Image => IMAGE_KIND,
            MediaKind::Placeholder => PLACEHOLDER_KIND,
        }
    }
}

/// Builds a placeholder carrying `attrs` (pending `src`, `width`, ...) and `upload_id`.
pub fn placeholder_node(mut attrs: Attrs, upload_id: &str) -> Node {
    attrs.insert(UPLOAD_ID_ATTR.to_string(), Value::String(upload_id.to_string()));
    Node::void(PLACEHOLDER_KIND, attrs)
}

/// The `upload_id` of a placeholder node; `None` for anything else.
pub fn placeholder_upload_id(node: &Node) -> Option<&str> {
    match node {
        Node::Void(v) if MediaKind::of_void(v) == Some(MediaKind::Placeholder) => {
            v.attr_str(UPLOAD_ID_ATTR)
        }
        _ => None,
    }
}

/// Final image for a placeholder: same attrs, resolved `src`, no `upload_id`.
pub fn resolved_image(placeholder: &VoidNode, url: &str) -> Node {
    let mut attrs = placeholder.attrs.clone();
    attrs.remove(UPLOAD_ID_ATTR);
    attrs.insert(SRC_ATTR.to_string(), Value::String(url.to_string()));
    Node::void(IMAGE_KIND, attrs)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePlaceholderPlugin {
    inline: bool,
}

impl ImagePlaceholderPlugin {
    pub fn new(inline: bool) -> Self {
        Self { inline }
    }
}

impl PlatePlugin for ImagePlaceholderPlugin {
    fn id(&self) -> &'static str {
        "image_upload.placeholder"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        let role = if self.inline {
            NodeRole::Inline
        } else {
            NodeRole::Block
        };
        vec![NodeSpec::void(PLACEHOLDER_KIND, role).draggable(false)]
    }
}

/// Rich-text registry with the placeholder node registered. Final images
/// take the same role as placeholders so resolution keeps the schema.
pub fn registry(options: &UploadOptions) -> PluginRegistry {
    let role = if options.inline {
        NodeRole::Inline
    } else {
        NodeRole::Block
    };
    let mut registry = PluginRegistry::richtext_with_image_role(role);
    registry
        .register_plugin(Box::new(ImagePlaceholderPlugin::new(options.inline)))
        .expect("image placeholder kind must not collide with richtext kinds");
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_spec_follows_inline_option() {
        let block = registry(&UploadOptions::default());
        let spec = &block.node_specs()[PLACEHOLDER_KIND];
        assert_eq!(spec.role, NodeRole::Block);
        assert!(spec.is_void);
        assert!(!spec.draggable);

        let inline = registry(&UploadOptions {
            inline: true,
            ..UploadOptions::default()
        });
        assert_eq!(inline.node_specs()[PLACEHOLDER_KIND].role, NodeRole::Inline);
    }

    #[test]
    fn final_image_shares_placeholder_role() {
        for inline in [false, true] {
            let registry = registry(&UploadOptions {
                inline,
                ..UploadOptions::default()
            });
            assert_eq!(
                registry.node_specs()[IMAGE_KIND].role,
                registry.node_specs()[PLACEHOLDER_KIND].role
            );
        }
    }

    #[test]
    fn resolved_image_keeps_width_and_drops_upload_id() {
        let mut attrs = Attrs::default();
        attrs.insert(SRC_ATTR.to_string(), Value::from("data:image/png;base64,AA=="));
        attrs.insert(WIDTH_ATTR.to_string(), Value::from(240));
        let Node::Void(placeholder) = placeholder_node(attrs, "abc123") else {
            unreachable!()
        };

        let image = resolved_image(&placeholder, "https://cdn.example.com/a.png");
        assert_eq!(MediaKind::of(&image), Some(MediaKind::Image));
        assert_eq!(placeholder_upload_id(&image), None);
        let attrs = image.attrs().unwrap();
        assert_eq!(attrs[SRC_ATTR], "https://cdn.example.com/a.png");
        assert_eq!(attrs[WIDTH_ATTR], 240);
    }

    #[test]
    fn only_void_images_are_media() {
        assert_eq!(MediaKind::of(&Node::paragraph("image")), None);
        assert_eq!(MediaKind::of(&Node::element(IMAGE_KIND, vec![])), None);
        assert_eq!(MediaKind::of(&Node::divider()), None);
    }
}
