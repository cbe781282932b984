pub mod cors;
pub mod get;
pub mod mutation;
pub mod pipeline;
pub mod validation;
pub mod visibility;

pub use pipeline::process;
pub use validation::{check_items, optimize_fields, ItemRules};
