//! Finder comments.
//!
//! The Finder keeps a free-form comment per file (the "Comments" field of
//! Get Info). There is no public API for it, so both operations generate a
//! short AppleScript that coerces the path to an alias inside the Finder
//! and reads or writes its `comment` property.
//!
//! An empty comment and "no comment" are indistinguishable: both read back
//! as `""`.

use std::panic::Location;
use std::path::Path;

use crate::script::{OsaScript, ScriptBridge, ScriptTemplate};

const GET_COMMENT: ScriptTemplate = ScriptTemplate::new(
    r#"tell application "Finder"
    set theFile to {{path}} as POSIX file as alias
    get comment of theFile
end tell"#,
);

const SET_COMMENT: ScriptTemplate = ScriptTemplate::new(
    r#"tell application "Finder"
    set theFile to {{path}} as POSIX file as alias
    set comment of theFile to {{comment}}
end tell"#,
);

/// A Finder comment operation failed.
///
/// Carries the bridge's description and the location of the public call
/// that failed, not of the code that detected the failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{description}")]
pub struct FinderCommentError {
    description: String,
    caller: &'static Location<'static>,
}

impl FinderCommentError {
    fn new(description: impl Into<String>, caller: &'static Location<'static>) -> Self {
        Self {
            description: description.into(),
            caller,
        }
    }

    /// The bridge's description of the failure.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Where the failing operation was called from.
    pub fn caller(&self) -> &'static Location<'static> {
        self.caller
    }
}

/// Finder comment accessor over a [`ScriptBridge`].
#[derive(Debug, Clone, Default)]
pub struct FinderComments<B = OsaScript> {
    bridge: B,
}

impl<B: ScriptBridge> FinderComments<B> {
    /// Create an accessor that runs its scripts through `bridge`.
    pub fn new(bridge: B) -> Self {
        Self { bridge }
    }

    /// Read the Finder comment of `path`.
    ///
    /// Returns `""` when the file has no comment.
    #[track_caller]
    pub fn get(&self, path: impl AsRef<Path>) -> Result<String, FinderCommentError> {
        let caller = Location::caller();
        let path = path.as_ref().to_string_lossy();
        tracing::debug!(%path, "reading Finder comment");

        let script = GET_COMMENT
            .render(&[("path", &*path)])
            .map_err(|e| FinderCommentError::new(e.to_string(), caller))?;
        self.bridge
            .run(&script)
            .map_err(|e| FinderCommentError::new(e.description, caller))
    }

    /// Set the Finder comment of `path`.
    ///
    /// `None` sets the empty comment, clearing any existing one.
    #[track_caller]
    pub fn set(
        &self,
        path: impl AsRef<Path>,
        comment: Option<&str>,
    ) -> Result<(), FinderCommentError> {
        let caller = Location::caller();
        let path = path.as_ref().to_string_lossy();
        let comment = comment.unwrap_or_default();
        tracing::debug!(%path, len = comment.len(), "writing Finder comment");

        let script = SET_COMMENT
            .render(&[("path", &*path), ("comment", comment)])
            .map_err(|e| FinderCommentError::new(e.to_string(), caller))?;
        self.bridge
            .run(&script)
            .map(|_| ())
            .map_err(|e| FinderCommentError::new(e.description, caller))
    }
}

/// Read the Finder comment of `path` via `osascript`.
#[track_caller]
pub fn get_finder_comments(path: impl AsRef<Path>) -> Result<String, FinderCommentError> {
    FinderComments::new(OsaScript::default()).get(path)
}

/// Set (or with `None`, clear) the Finder comment of `path` via `osascript`.
#[track_caller]
pub fn set_finder_comments(
    path: impl AsRef<Path>,
    comment: Option<&str>,
) -> Result<(), FinderCommentError> {
    FinderComments::new(OsaScript::default()).set(path, comment)
}
