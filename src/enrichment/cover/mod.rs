//! Cover art resolution and caching (§4.3).
//!
//! `getCover` checks embedded art, then a folder-level image file, then
//! falls back to a remote cover archive keyed by release-group. Remote
//! bytes are cached on disk keyed by the MD5 of the source URL so a second
//! folder sharing the same release never re-downloads the same image.

mod cache;
mod client;
pub mod dto;

pub use cache::CoverCache;
pub use client::{CoverArt, CoverClient, CoverSize};
