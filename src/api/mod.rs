mod audit;
mod error;
mod handlers;
mod helpers;
mod router;
mod scope;
mod session;
mod types;

pub use error::err;
pub use router::handle_request;
pub use types::{AppState, Request};
