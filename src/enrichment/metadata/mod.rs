//! Recording/release/release-group lookups against a MusicBrainz-compatible
//! metadata registry (§4.2).

mod adapter;
mod client;
pub mod dto;

pub use client::{MetadataClient, ReleaseDurationSequence};
