use plate_core::{Node, Slice, VoidNode};
use tracing::debug;

use crate::events::UploadSource;
use crate::orchestrator::ImageUploader;
use crate::placeholder::{MediaKind, SRC_ATTR, placeholder_node};

impl ImageUploader {
    /// Rewrites pasted content so every image with a `src`, at any depth,
    /// becomes a placeholder, and starts one upload per replaced image.
    ///
    /// Non-image nodes and the slice's open boundaries pass through untouched.
    /// Without an active surface the slice is returned as is.
    pub fn transform_pasted(&self, slice: Slice) -> Slice {
        let Some(surface) = self.active_surface() else {
            debug!("no active surface; pasted images left as they are");
            return slice;
        };

        let Slice {
            mut content,
            open_start,
            open_end,
        } = slice;
        let mut pending: Vec<(String, String)> = Vec::new();
        self.splice_nested(&mut content, &mut pending);

        for (url, upload_id) in pending {
            debug!(%upload_id, "re-uploading pasted image");
            self.spawn_upload(surface.clone(), UploadSource::Url(url), upload_id);
        }
        Slice::new(content, open_start, open_end)
    }

    fn splice_nested(&self, children: &mut [Node], pending: &mut Vec<(String, String)>) {
        for child in children.iter_mut() {
            let replacement = match child {
                Node::Void(void) => pasted_image_src(void).map(|src| {
                    let upload_id = self.config().next_upload_id();
                    let node = placeholder_node(void.attrs.clone(), &upload_id);
                    pending.push((src, upload_id));
                    node
                }),
                Node::Element(el) => {
                    self.splice_nested(&mut el.children, pending);
                    None
                }
                Node::Text(_) => None,
            };
            if let Some(node) = replacement {
                *child = node;
            }
        }
    }
}

fn pasted_image_src(void: &VoidNode) -> Option<String> {
    if MediaKind::of_void(void) != Some(MediaKind::Image) {
        return None;
    }
    void.attr_str(SRC_ATTR)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
}
