pub mod alert;
pub mod chunk;
pub mod clinical;
pub mod enums;
pub mod session;

pub use alert::*;
pub use chunk::*;
pub use clinical::*;
pub use enums::*;
pub use session::*;
