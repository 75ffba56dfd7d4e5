//! Building blocks shared by the connection manager

pub mod backoff;
pub mod context;
pub mod error;
pub mod event;

pub use backoff::{Backoff, BackoffPolicy};
pub use context::{Context, Instant};
pub use error::{ContextError, ManagerError, ManagerResult, SessionError};
pub use event::OneShotEvent;
