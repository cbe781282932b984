pub mod types;
pub mod schema;
pub mod loader;
pub mod validator;
pub mod resolved;

pub use types::*;
pub use schema::*;
pub use loader::*;
pub use validator::*;
pub use resolved::*;
