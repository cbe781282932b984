//! HTTP handlers for registered resources.

pub mod resource;
pub use resource::dispatch;
