pub mod autocomplete;
pub mod coerce;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod expr;
pub mod io;
pub mod paths;
pub mod store;
pub mod types;

pub use dispatch::{ActionKind, Dispatcher, NoOpReason, Outcome};
pub use error::{FlowvarError, Result};
pub use store::{MemoryStore, VariableStore};
pub use types::{ActionArgs, Value, Variable, VariableRef, VariableType};
