pub mod content;
pub mod conversion;
pub mod data_change;
pub mod type_tree;

pub use content::{validate_event_filter, FilterEvaluator};
pub use data_change::{default_data_change_filter, install_data_change_filter, passes};
pub use type_tree::{EventTypeTree, TypeHierarchy};
