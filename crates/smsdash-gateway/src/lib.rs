//! # SmsDash Gateway
//! JSON API over the schedule book, dispatcher and AI drafting.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
