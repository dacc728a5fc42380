pub mod session;

pub use session::{BoxRecord, Item, Session};
