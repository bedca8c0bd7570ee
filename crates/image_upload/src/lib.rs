//! Image upload support for the plate editor.
//!
//! Dropped, pasted and programmatically added images are inserted as
//! `image_placeholder` nodes carrying an `upload_id`. Once the host's
//! [`Uploader`] resolves, every placeholder still carrying that id is swapped
//! for a final `image` node in a single edit that stays out of undo history.

mod config;
mod error;
mod events;
mod file;
mod orchestrator;
mod paste;
mod placeholder;
mod uploader;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::events::*;
pub use crate::file::*;
pub use crate::orchestrator::*;
pub use crate::placeholder::*;
pub use crate::uploader::*;
