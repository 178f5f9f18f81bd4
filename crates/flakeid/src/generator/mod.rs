mod interface;
mod lock;
mod mutex;

pub use interface::*;
pub use lock::*;
pub(crate) use mutex::*;
