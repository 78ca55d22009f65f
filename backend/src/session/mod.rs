//! Anti-forgery protection for the grid's write and import endpoints.
//!
//! `GET /api/grid/session` binds a random token to a session cookie. Requests
//! that change data must echo the token in the `X-CSRF-Token` header.

pub mod state;

pub use state::SessionStore;

pub const SESSION_COOKIE: &str = "grid_session";
pub const TOKEN_HEADER: &str = "X-CSRF-Token";
