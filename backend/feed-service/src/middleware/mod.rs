pub mod identity;

pub use identity::{Viewer, USER_ID_HEADER};
