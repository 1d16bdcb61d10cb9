//! Tally core — entity collection, persistence and undo.
//!
//! Nothing here knows about HTML; the routes render whatever the session holds.

pub mod config;
pub mod entity;
pub mod error;
pub mod session;
pub mod storage;
pub mod store;
pub mod undo;
