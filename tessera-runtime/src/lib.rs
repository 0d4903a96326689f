pub mod asset;
pub mod economy;
pub mod error;
pub mod events;
pub mod executor;
pub mod market;
pub mod session;

pub use error::ExecError;
pub use events::{Emitter, Event, EventKind};
pub use executor::{Context, Executor};
