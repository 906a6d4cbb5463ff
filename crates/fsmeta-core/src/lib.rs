//! Filesystem metadata: extended attributes, volumes and Finder comments.
//!
//! This crate is a thin layer over capabilities owned elsewhere: the
//! kernel's extended attribute calls, the system mount table and
//! `statvfs`, and the Finder's AppleScript interface. It adds optional
//! argument defaulting, display formatting and error translation, and
//! nothing is cached between calls.
//!
//! # Components
//!
//! - [`xattr_get_human_readable`] - Fetch an extended attribute for display,
//!   hex-dumping values that are not UTF-8
//! - [`all_volumes`] - Describe every mounted volume
//! - [`get_finder_comments`] / [`set_finder_comments`] - Read or write the
//!   Finder's per-file comment
//!
//! The three facades are independent; none calls another.
//!
//! ## Lower-level pieces
//!
//! - [`xattr`] - Raw `get`/`list`/`set`/`remove` and the [`XattrSource`] seam
//! - [`utf8`] - The UTF-8 validity check and the `xattr -l` style hex dump
//! - [`mount_table`] - Platform mount table parsing
//! - [`script`] - AppleScript templates with escaping and the
//!   [`ScriptBridge`] seam, implemented by [`OsaScript`]
//!
//! # Example
//!
//! ```no_run
//! use fsmeta_core::{all_volumes, xattr_get_human_readable, XattrOptions, ReadableValue};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! for (mountpoint, info) in all_volumes(false)? {
//!     println!("{}: {:?}", mountpoint.display(), info.total_capacity);
//! }
//!
//! match xattr_get_human_readable("/tmp/file", "user.note", XattrOptions::default(), 0)? {
//!     ReadableValue::Text(text) => println!("{text}"),
//!     ReadableValue::Present => println!("(empty)"),
//!     ReadableValue::Absent => println!("(not set)"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod finder;
pub mod mount_table;
pub mod script;
pub mod utf8;
pub mod volume;
pub mod xattr;

// Extended attribute facade
pub use xattr::{
    get_human_readable as xattr_get_human_readable, AttrValue, NativeXattr, ReadableValue,
    XattrOptions, XattrReader, XattrSource,
};

// Volume facade: the host query under its public name
pub use volume::volume_information as all_volumes;
pub use volume::{VolumeInfo, VolumeMap};

// Finder comment facade
pub use finder::{get_finder_comments, set_finder_comments, FinderComments};
pub use script::{AppleScript, OsaScript, ScriptBridge, ScriptTemplate};

pub use error::{
    BridgeError, FinderCommentError, MountTableError, ScriptBuildError, VolumeError, XattrError,
};
