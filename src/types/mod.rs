mod index;
mod node;

pub use index::{Composable, ComposableTable, Index, DEFAULT_INDEX_NAME, INDEX_VERSION};
pub use node::Node;
pub(crate) use node::validate_entry_name;
