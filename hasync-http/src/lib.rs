pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{init_tracing, router, serve};
