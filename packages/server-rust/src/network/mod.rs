//! Networking: configuration, HTTP layers, handlers, serving state, and
//! the server builder.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod server;
pub mod shutdown;

pub use config::*;
pub use handlers::AppState;
pub use server::{NetworkServer, ServerBuilder};
pub use shutdown::*;
