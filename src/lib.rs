//! Signed cookies and pluggable session storage for HTTP services.
//!
//! A [`Cookie`] reads a typed value from a `Cookie` header and writes it back as a
//! `Set-Cookie` header, optionally signed with a rotating list of secrets. Sessions build on
//! top of it through the [`SessionStorage`] trait:
//!
//! - [`CookieSessionStorage`] keeps the whole session in the cookie.
//! - [`IdSessionStorage`] keeps it in a [`SessionDataStore`] and puts only an opaque id in
//!   the cookie. Built-in stores are [`MemoryStore`], [`FileStore`], [`KvSessionStore`] and
//!   [`TableSessionStore`]; any other backend plugs in by implementing the four-operation
//!   [`SessionDataStore`] trait.
//!
//! Storages are plain values: construct one, share it with your handlers, and call
//! `get_session` / `commit_session` / `destroy_session` around your request handling, or
//! install [`SessionManagerLayer`] to have that done for every request.
//!
//! # Security
//! Session cookies without secrets carry no tamper resistance. For [`CookieSessionStorage`]
//! that means a client can rewrite its own session data; always configure secrets outside of
//! tests.

mod config;
mod container;
mod error;
pub mod format;
mod handle;
pub mod layer;
mod session;
pub mod sign;
pub mod storage;
pub mod upload;

pub use cookie::SameSite;

pub use crate::config::{CookieConfig, CookieOptions};
pub use crate::container::Cookie;
pub use crate::error::{Error, Result, UploadError};
pub use crate::handle::SessionHandle;
pub use crate::layer::SessionManagerLayer;
pub use crate::session::{Session, SessionData};
pub use crate::storage::{
    CookieSessionStorage, DEFAULT_COOKIE_NAME, FileSessionStorage, FileStore, IdSessionStorage,
    KvNamespace, KvSessionStore, MemorySessionStorage, MemoryStore, SessionDataStore,
    SessionStorage, SessionTable, TableItem, TableSessionStore,
};
