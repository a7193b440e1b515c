//! Source archives: where to get them, fetching with a hash, mirroring and
//! extraction.
//!
//! A tagged revision prefers a release asset named `<repo>-<tag>.tar.gz` or
//! `<repo>-<tag>.zip`; otherwise, and for commits, the host's generated
//! `.zip` archive is used. Every archive is also published under the mirror
//! base URL, so declarations list the mirror first and upstream second.

pub mod extract;
pub mod fetch;
pub mod location;

pub use extract::{ArchiveKind, extract_archive};
pub use fetch::{
    ArchiveMirror, CommandMirror, Downloader, FetchedArchive, HashingWriter, fetch_archive,
};
pub use location::{
    ArchiveLocation, mirror_url, preferred_asset, resolve_location, tag_strip_prefix,
    without_scheme,
};
