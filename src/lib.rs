//! # Gatehouse (session and profile coordination)
//!
//! `gatehouse` sits between a remote identity provider, a per-user profile
//! store and the reactive state a front-end renders from. The provider owns
//! credentials, tokens and session lifetime; this crate only observes the
//! session it issues and enriches it with a locally owned profile.
//!
//! ## State
//!
//! The [`gatehouse::Coordinator`] publishes an [`gatehouse::AuthSnapshot`]
//! through a `tokio::sync::watch` channel. A profile is only ever published
//! next to a session with the same `uid`; a sign-out clears both in the same
//! publication.
//!
//! ## Backends
//!
//! - [`firebase`]: Identity Toolkit and Firestore REST adapters.
//! - [`gatehouse::memory`]: in-process backends used by the `demo` action and
//!   by tests.

pub mod cli;
pub mod firebase;
pub mod gatehouse;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
