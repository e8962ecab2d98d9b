pub mod models;
pub use models::*;

mod locks;
pub use locks::*;

mod dispatcher;
mod webhook;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use webhook::{health, receive_change};
