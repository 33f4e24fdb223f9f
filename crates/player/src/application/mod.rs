//! Application layer: the owning session object and intent validation.

pub mod dispatcher;
pub mod dto;
pub mod session;

pub use dispatcher::{ActionDispatcher, DispatchError};
pub use session::{Session, SessionSnapshot};
