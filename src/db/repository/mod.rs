//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a borrowed `Connection`; callers own the connection
//! and its lifetime. All public functions are re-exported here.

mod alert;
mod chunk;
mod session;

pub use alert::*;
pub use chunk::*;
pub use session::*;
