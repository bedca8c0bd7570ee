mod core;
mod ops;
mod plugin;

pub use crate::core::*;
pub use crate::ops::*;
pub use crate::plugin::*;
