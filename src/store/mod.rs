// ============================================================================
// spark-observable - Store Module
// Observable JSON nodes and the operations that read and write them
// ============================================================================

pub mod debug;
pub mod node;
pub mod ops;

pub use debug::debug_dump;
pub use node::Node;
pub use ops::{
    create_root, is_node, mutate, read, read_map, read_write, try_mutate, try_write,
    try_write_with, write, write_with,
};
