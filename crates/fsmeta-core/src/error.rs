//! Error types for the fsmeta-core crate
//!
//! Each facade has its own error type; this module gathers them in one place.

pub use crate::finder::FinderCommentError;
pub use crate::mount_table::MountTableError;
pub use crate::script::{BridgeError, ScriptBuildError};
pub use crate::volume::VolumeError;
pub use crate::xattr::XattrError;
