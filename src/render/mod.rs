// ============================================================================
// spark-observable - Render Module
// Templates reconciled into a host tree
// ============================================================================

pub mod component;
pub mod element;
pub mod helpers;
pub mod host;
pub mod memory;
pub mod reconciler;
pub mod shadow;
pub mod template;

pub use component::Component;
pub use element::{el, ElementTemplate, StyleMap};
pub use helpers::{
    br, button, div, flex_column, flex_row, join, join_br, join_space, ol, style_sheet, tag, ul,
};
pub use host::{EventHandler, HostTree};
pub use memory::{HostOp, MemoryHost, MemoryNode};
pub use reconciler::{render, Mount};
pub use shadow::Shadow;
pub use template::{
    conditional, conditional_else, map_sequence, map_sequence_reactive, switch, Branches,
    DynamicSlot, Template, TemplateFn,
};
