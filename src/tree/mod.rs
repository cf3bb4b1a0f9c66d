//! Document tree: positional identity and live node state.

pub mod parsenode;
pub mod refnode;

pub use parsenode::{DescIndex, FeatIndex, Inherited, KindCounter, NodeData, ParseNode};
pub use refnode::{NodeKind, NodePath, RefNode};
