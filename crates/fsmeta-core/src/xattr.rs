//! Extended attribute access.
//!
//! [`get`], [`list`], [`set`] and [`remove`] are thin wrappers over the
//! platform syscalls. [`get_human_readable`] is the display-oriented reader:
//! it forwards to the raw get and replaces values that are not valid UTF-8
//! with a hex dump (see [`crate::utf8::hex_dump`]).
//!
//! # Platform Differences
//!
//! - **macOS**: `position` and every option are passed to the kernel as-is.
//!   Only the resource fork honours a non-zero position.
//! - **Linux**: there is no kernel position argument, so `position` is
//!   applied as a byte offset into the fetched value. `show_compression`
//!   has no equivalent and is ignored.
//! - **Other**: every call fails with [`XattrError::Unsupported`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::utf8;

/// Flags accepted by the attribute calls.
///
/// Flags that mean nothing to a given call are ignored by it: `get` ignores
/// `create_only` / `replace_only`, `set` ignores `show_compression`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct XattrOptions {
    /// Operate on a symlink itself rather than its target
    pub no_follow: bool,
    /// Expose HFS+ compression attributes (macOS only)
    pub show_compression: bool,
    /// Fail if the attribute already exists
    pub create_only: bool,
    /// Fail if the attribute does not exist yet
    pub replace_only: bool,
}

impl XattrOptions {
    /// Build options from flag names such as `"nofollow"` or `"showCompression"`.
    pub fn from_names<'a, I>(names: I) -> Result<Self, XattrError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().try_fold(Self::default(), |mut opts, name| {
            match name.parse::<XattrFlag>()? {
                XattrFlag::NoFollow => opts.no_follow = true,
                XattrFlag::ShowCompression => opts.show_compression = true,
                XattrFlag::CreateOnly => opts.create_only = true,
                XattrFlag::ReplaceOnly => opts.replace_only = true,
            }
            Ok(opts)
        })
    }
}

/// A single named option flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XattrFlag {
    /// `nofollow`
    NoFollow,
    /// `showcompression`
    ShowCompression,
    /// `createonly`
    CreateOnly,
    /// `replaceonly`
    ReplaceOnly,
}

impl FromStr for XattrFlag {
    type Err = XattrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "nofollow" => Ok(Self::NoFollow),
            "showcompression" => Ok(Self::ShowCompression),
            "createonly" | "create" => Ok(Self::CreateOnly),
            "replaceonly" | "replace" => Ok(Self::ReplaceOnly),
            _ => Err(XattrError::UnknownOption(s.to_string())),
        }
    }
}

/// Result of a raw attribute fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// The attribute's bytes
    Data(Vec<u8>),
    /// The attribute exists but holds no data
    Present,
    /// No attribute by that name
    Absent,
}

/// Attribute value prepared for display.
///
/// Serializes as a string, `true`, or `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadableValue {
    /// UTF-8 text, or a hex dump when the raw value was not UTF-8
    Text(String),
    /// The attribute exists but holds no data
    Present,
    /// No attribute by that name
    Absent,
}

impl ReadableValue {
    /// The text, if this value has one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Present | Self::Absent => None,
        }
    }
}

impl Serialize for ReadableValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Present => serializer.serialize_bool(true),
            Self::Absent => serializer.serialize_none(),
        }
    }
}

impl From<AttrValue> for ReadableValue {
    fn from(value: AttrValue) -> Self {
        match value {
            AttrValue::Data(bytes) => match utf8::decode(bytes) {
                Ok(text) => Self::Text(text),
                Err(bytes) => Self::Text(utf8::hex_dump(&bytes)),
            },
            AttrValue::Present => Self::Present,
            AttrValue::Absent => Self::Absent,
        }
    }
}

/// Errors from extended attribute calls.
#[derive(Debug, thiserror::Error)]
pub enum XattrError {
    /// Path or attribute name cannot be passed to the kernel
    #[error("Invalid argument: {0} contains a NUL byte")]
    InvalidArgument(String),

    /// Unrecognized option flag name
    #[error("Unknown extended attribute option: {0}")]
    UnknownOption(String),

    /// Filesystem or platform has no extended attribute support
    #[error("Extended attributes are not supported for {}", path.display())]
    Unsupported {
        /// The path the call was made on
        path: PathBuf,
    },

    /// Any other failure reported by the kernel
    #[error("{op} failed for {}{}: {source}", path.display(), name.as_deref().map(|n| format!(" ({n})")).unwrap_or_default())]
    Io {
        /// The syscall that failed
        op: &'static str,
        /// The path the call was made on
        path: PathBuf,
        /// The attribute name, if the call had one
        name: Option<String>,
        /// The underlying OS error
        #[source]
        source: std::io::Error,
    },
}

impl XattrError {
    /// Kind of the underlying OS error, if there is one.
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io { source, .. } => Some(source.kind()),
            _ => None,
        }
    }
}

/// Where raw attribute values come from.
///
/// [`NativeXattr`] is the real implementation; tests and callers with
/// their own storage can supply another.
pub trait XattrSource {
    /// Fetch the raw value of `name` on `path`.
    fn get(
        &self,
        path: &Path,
        name: &str,
        options: XattrOptions,
        position: u32,
    ) -> Result<AttrValue, XattrError>;

    /// List attribute names on `path`.
    fn list(&self, path: &Path, options: XattrOptions) -> Result<Vec<String>, XattrError>;
}

/// The platform attribute syscalls.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeXattr;

impl XattrSource for NativeXattr {
    fn get(
        &self,
        path: &Path,
        name: &str,
        options: XattrOptions,
        position: u32,
    ) -> Result<AttrValue, XattrError> {
        get(path, name, options, position)
    }

    fn list(&self, path: &Path, options: XattrOptions) -> Result<Vec<String>, XattrError> {
        list(path, options)
    }
}

/// Human-readable attribute reader over any [`XattrSource`].
#[derive(Debug, Clone, Default)]
pub struct XattrReader<S = NativeXattr> {
    source: S,
}

impl<S: XattrSource> XattrReader<S> {
    /// Create a reader over `source`.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Fetch `name` and prepare it for display.
    ///
    /// Arguments go to the source unchanged and its errors come back
    /// unchanged. Valid UTF-8 is returned as text, other data as
    /// [`utf8::hex_dump`] output, and `Present` / `Absent` pass through.
    pub fn get_human_readable(
        &self,
        path: &Path,
        name: &str,
        options: XattrOptions,
        position: u32,
    ) -> Result<ReadableValue, XattrError> {
        self.source
            .get(path, name, options, position)
            .map(ReadableValue::from)
    }

    /// Every attribute on `path` with its display value, in listing order.
    ///
    /// An attribute removed between the listing and the fetch shows up as
    /// [`ReadableValue::Absent`].
    pub fn read_all(
        &self,
        path: &Path,
        options: XattrOptions,
    ) -> Result<Vec<(String, ReadableValue)>, XattrError> {
        self.source
            .list(path, options)?
            .into_iter()
            .map(|name| {
                let value = self.get_human_readable(path, &name, options, 0)?;
                Ok((name, value))
            })
            .collect()
    }
}

/// Fetch an attribute through the native binding and prepare it for display.
pub fn get_human_readable(
    path: impl AsRef<Path>,
    name: &str,
    options: XattrOptions,
    position: u32,
) -> Result<ReadableValue, XattrError> {
    XattrReader::new(NativeXattr).get_human_readable(path.as_ref(), name, options, position)
}

/// Fetch the raw value of an attribute.
///
/// A missing attribute is [`AttrValue::Absent`], a zero-length one
/// [`AttrValue::Present`].
pub fn get(
    path: impl AsRef<Path>,
    name: &str,
    options: XattrOptions,
    position: u32,
) -> Result<AttrValue, XattrError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), name, ?options, position, "getxattr");
    native::get(path, name, options, position)
}

/// List the attribute names on `path`.
pub fn list(path: impl AsRef<Path>, options: XattrOptions) -> Result<Vec<String>, XattrError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), ?options, "listxattr");
    native::list(path, options)
}

/// Write an attribute.
pub fn set(
    path: impl AsRef<Path>,
    name: &str,
    value: &[u8],
    options: XattrOptions,
    position: u32,
) -> Result<(), XattrError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), name, len = value.len(), ?options, "setxattr");
    native::set(path, name, value, options, position)
}

/// Remove an attribute.
pub fn remove(path: impl AsRef<Path>, name: &str, options: XattrOptions) -> Result<(), XattrError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), name, ?options, "removexattr");
    native::remove(path, name, options)
}

// ============================================================================
// Native binding (macOS / Linux)
// ============================================================================

#[cfg(any(target_os = "macos", target_os = "linux"))]
#[allow(unsafe_code)]
mod native {
    use std::ffi::{c_void, CString};
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::path::Path;
    use std::ptr;

    use super::{AttrValue, XattrError, XattrOptions};

    /// Attempts before giving up on a value that keeps changing size.
    const MAX_ATTEMPTS: usize = 4;

    #[cfg(target_os = "macos")]
    const ENOATTR: i32 = libc::ENOATTR;
    #[cfg(target_os = "linux")]
    const ENOATTR: i32 = libc::ENODATA;

    pub(super) fn get(
        path: &Path,
        name: &str,
        options: XattrOptions,
        position: u32,
    ) -> Result<AttrValue, XattrError> {
        let c_path = c_path(path)?;
        let c_name = c_name(name)?;
        let fail = |e| error("getxattr", path, Some(name), e);

        let mut last_err = None;
        for _ in 0..MAX_ATTEMPTS {
            let size = match sys_get(&c_path, &c_name, &mut [], position, options) {
                Ok(size) => size,
                Err(e) if e.raw_os_error() == Some(ENOATTR) => return Ok(AttrValue::Absent),
                Err(e) => return Err(fail(e)),
            };

            let mut buf = vec![0u8; size];
            if size > 0 {
                match sys_get(&c_path, &c_name, &mut buf, position, options) {
                    Ok(len) => buf.truncate(len),
                    Err(e) if e.raw_os_error() == Some(libc::ERANGE) => {
                        // Value grew between the probe and the read
                        last_err = Some(e);
                        continue;
                    }
                    Err(e) if e.raw_os_error() == Some(ENOATTR) => return Ok(AttrValue::Absent),
                    Err(e) => return Err(fail(e)),
                }
            }

            #[cfg(target_os = "linux")]
            let buf = apply_position(buf, position);

            return Ok(if buf.is_empty() {
                AttrValue::Present
            } else {
                AttrValue::Data(buf)
            });
        }

        Err(fail(last_err.unwrap_or_else(|| io::Error::from_raw_os_error(libc::ERANGE))))
    }

    pub(super) fn list(path: &Path, options: XattrOptions) -> Result<Vec<String>, XattrError> {
        let c_path = c_path(path)?;
        let fail = |e| error("listxattr", path, None, e);

        let mut last_err = None;
        for _ in 0..MAX_ATTEMPTS {
            let size = sys_list(&c_path, &mut [], options).map_err(fail)?;
            let mut buf = vec![0u8; size];
            if size > 0 {
                match sys_list(&c_path, &mut buf, options) {
                    Ok(len) => buf.truncate(len),
                    Err(e) if e.raw_os_error() == Some(libc::ERANGE) => {
                        last_err = Some(e);
                        continue;
                    }
                    Err(e) => return Err(fail(e)),
                }
            }
            return Ok(split_names(&buf));
        }

        Err(fail(last_err.unwrap_or_else(|| io::Error::from_raw_os_error(libc::ERANGE))))
    }

    pub(super) fn set(
        path: &Path,
        name: &str,
        value: &[u8],
        options: XattrOptions,
        position: u32,
    ) -> Result<(), XattrError> {
        let c_path = c_path(path)?;
        let c_name = c_name(name)?;
        sys_set(&c_path, &c_name, value, position, options)
            .map_err(|e| error("setxattr", path, Some(name), e))
    }

    pub(super) fn remove(path: &Path, name: &str, options: XattrOptions) -> Result<(), XattrError> {
        let c_path = c_path(path)?;
        let c_name = c_name(name)?;
        sys_remove(&c_path, &c_name, options).map_err(|e| error("removexattr", path, Some(name), e))
    }

    fn c_path(path: &Path) -> Result<CString, XattrError> {
        CString::new(path.as_os_str().as_bytes())
            .map_err(|_| XattrError::InvalidArgument(path.display().to_string()))
    }

    fn c_name(name: &str) -> Result<CString, XattrError> {
        CString::new(name).map_err(|_| XattrError::InvalidArgument(name.to_string()))
    }

    fn error(op: &'static str, path: &Path, name: Option<&str>, source: io::Error) -> XattrError {
        if source.raw_os_error() == Some(libc::ENOTSUP) {
            return XattrError::Unsupported {
                path: path.to_path_buf(),
            };
        }
        XattrError::Io {
            op,
            path: path.to_path_buf(),
            name: name.map(str::to_string),
            source,
        }
    }

    /// The kernel returns names as a NUL-separated list.
    pub(super) fn split_names(buf: &[u8]) -> Vec<String> {
        buf.split(|&b| b == 0)
            .filter(|name| !name.is_empty())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect()
    }

    #[cfg(target_os = "linux")]
    pub(super) fn apply_position(mut buf: Vec<u8>, position: u32) -> Vec<u8> {
        let offset = usize::try_from(position).unwrap_or(usize::MAX).min(buf.len());
        buf.drain(..offset);
        buf
    }

    fn buf_ptr(buf: &mut [u8]) -> *mut c_void {
        if buf.is_empty() {
            ptr::null_mut()
        } else {
            buf.as_mut_ptr().cast()
        }
    }

    fn size_result(ret: isize) -> io::Result<usize> {
        usize::try_from(ret).map_err(|_| io::Error::last_os_error())
    }

    fn unit_result(ret: libc::c_int) -> io::Result<()> {
        if ret == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(target_os = "macos")]
    fn flags(options: XattrOptions) -> libc::c_int {
        let mut flags = 0;
        if options.no_follow {
            flags |= libc::XATTR_NOFOLLOW;
        }
        if options.show_compression {
            flags |= libc::XATTR_SHOWCOMPRESSION;
        }
        if options.create_only {
            flags |= libc::XATTR_CREATE;
        }
        if options.replace_only {
            flags |= libc::XATTR_REPLACE;
        }
        flags
    }

    #[cfg(target_os = "macos")]
    fn sys_get(
        path: &CString,
        name: &CString,
        buf: &mut [u8],
        position: u32,
        options: XattrOptions,
    ) -> io::Result<usize> {
        // SAFETY: path and name are NUL-terminated; buf is either null with
        // size 0 or valid for buf.len() bytes.
        let ret = unsafe {
            libc::getxattr(
                path.as_ptr(),
                name.as_ptr(),
                buf_ptr(buf),
                buf.len(),
                position,
                flags(options) & !(libc::XATTR_CREATE | libc::XATTR_REPLACE),
            )
        };
        size_result(ret)
    }

    #[cfg(target_os = "macos")]
    fn sys_list(path: &CString, buf: &mut [u8], options: XattrOptions) -> io::Result<usize> {
        // SAFETY: see sys_get.
        let ret = unsafe {
            libc::listxattr(
                path.as_ptr(),
                buf_ptr(buf).cast(),
                buf.len(),
                flags(options) & !(libc::XATTR_CREATE | libc::XATTR_REPLACE),
            )
        };
        size_result(ret)
    }

    #[cfg(target_os = "macos")]
    fn sys_set(
        path: &CString,
        name: &CString,
        value: &[u8],
        position: u32,
        options: XattrOptions,
    ) -> io::Result<()> {
        // SAFETY: value is valid for value.len() bytes.
        let ret = unsafe {
            libc::setxattr(
                path.as_ptr(),
                name.as_ptr(),
                value.as_ptr().cast(),
                value.len(),
                position,
                flags(options) & !libc::XATTR_SHOWCOMPRESSION,
            )
        };
        unit_result(ret)
    }

    #[cfg(target_os = "macos")]
    fn sys_remove(path: &CString, name: &CString, options: XattrOptions) -> io::Result<()> {
        // SAFETY: path and name are NUL-terminated.
        let ret = unsafe {
            libc::removexattr(
                path.as_ptr(),
                name.as_ptr(),
                flags(options) & libc::XATTR_NOFOLLOW,
            )
        };
        unit_result(ret)
    }

    #[cfg(target_os = "linux")]
    fn sys_get(
        path: &CString,
        name: &CString,
        buf: &mut [u8],
        _position: u32,
        options: XattrOptions,
    ) -> io::Result<usize> {
        // SAFETY: path and name are NUL-terminated; buf is either null with
        // size 0 or valid for buf.len() bytes.
        let ret = unsafe {
            if options.no_follow {
                libc::lgetxattr(path.as_ptr(), name.as_ptr(), buf_ptr(buf), buf.len())
            } else {
                libc::getxattr(path.as_ptr(), name.as_ptr(), buf_ptr(buf), buf.len())
            }
        };
        size_result(ret)
    }

    #[cfg(target_os = "linux")]
    fn sys_list(path: &CString, buf: &mut [u8], options: XattrOptions) -> io::Result<usize> {
        // SAFETY: see sys_get.
        let ret = unsafe {
            if options.no_follow {
                libc::llistxattr(path.as_ptr(), buf_ptr(buf).cast(), buf.len())
            } else {
                libc::listxattr(path.as_ptr(), buf_ptr(buf).cast(), buf.len())
            }
        };
        size_result(ret)
    }

    #[cfg(target_os = "linux")]
    fn sys_set(
        path: &CString,
        name: &CString,
        value: &[u8],
        position: u32,
        options: XattrOptions,
    ) -> io::Result<()> {
        if position != 0 {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        let mut flags = 0;
        if options.create_only {
            flags |= libc::XATTR_CREATE;
        }
        if options.replace_only {
            flags |= libc::XATTR_REPLACE;
        }
        // SAFETY: value is valid for value.len() bytes.
        let ret = unsafe {
            if options.no_follow {
                libc::lsetxattr(path.as_ptr(), name.as_ptr(), value.as_ptr().cast(), value.len(), flags)
            } else {
                libc::setxattr(path.as_ptr(), name.as_ptr(), value.as_ptr().cast(), value.len(), flags)
            }
        };
        unit_result(ret)
    }

    #[cfg(target_os = "linux")]
    fn sys_remove(path: &CString, name: &CString, options: XattrOptions) -> io::Result<()> {
        // SAFETY: path and name are NUL-terminated.
        let ret = unsafe {
            if options.no_follow {
                libc::lremovexattr(path.as_ptr(), name.as_ptr())
            } else {
                libc::removexattr(path.as_ptr(), name.as_ptr())
            }
        };
        unit_result(ret)
    }
}

/// Stub for unsupported platforms
#[cfg(not(any(target_os = "macos", target_os = "linux")))]
mod native {
    use std::path::Path;

    use super::{AttrValue, XattrError, XattrOptions};

    fn unsupported(path: &Path) -> XattrError {
        XattrError::Unsupported {
            path: path.to_path_buf(),
        }
    }

    pub(super) fn get(
        path: &Path,
        _name: &str,
        _options: XattrOptions,
        _position: u32,
    ) -> Result<AttrValue, XattrError> {
        Err(unsupported(path))
    }

    pub(super) fn list(path: &Path, _options: XattrOptions) -> Result<Vec<String>, XattrError> {
        Err(unsupported(path))
    }

    pub(super) fn set(
        path: &Path,
        _name: &str,
        _value: &[u8],
        _options: XattrOptions,
        _position: u32,
    ) -> Result<(), XattrError> {
        Err(unsupported(path))
    }

    pub(super) fn remove(path: &Path, _name: &str, _options: XattrOptions) -> Result<(), XattrError> {
        Err(unsupported(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    /// In-memory source that records the arguments it was called with.
    #[derive(Default)]
    struct FakeSource {
        values: HashMap<String, AttrValue>,
        calls: RefCell<Vec<(PathBuf, String, XattrOptions, u32)>>,
    }

    impl FakeSource {
        fn with(name: &str, value: AttrValue) -> Self {
            let mut source = Self::default();
            source.values.insert(name.to_string(), value);
            source
        }
    }

    impl XattrSource for &FakeSource {
        fn get(
            &self,
            path: &Path,
            name: &str,
            options: XattrOptions,
            position: u32,
        ) -> Result<AttrValue, XattrError> {
            self.calls
                .borrow_mut()
                .push((path.to_path_buf(), name.to_string(), options, position));
            if path == Path::new("/missing") {
                return Err(XattrError::Io {
                    op: "getxattr",
                    path: path.to_path_buf(),
                    name: Some(name.to_string()),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            Ok(self.values.get(name).cloned().unwrap_or(AttrValue::Absent))
        }

        fn list(&self, _path: &Path, _options: XattrOptions) -> Result<Vec<String>, XattrError> {
            let mut names: Vec<String> = self.values.keys().cloned().collect();
            names.sort();
            Ok(names)
        }
    }

    /// Attribute name valid for unprivileged users on the current platform.
    fn test_attr(suffix: &str) -> String {
        if cfg!(target_os = "linux") {
            format!("user.fsmeta.{suffix}")
        } else {
            format!("com.fsmeta.{suffix}")
        }
    }

    #[test]
    fn test_reader_forwards_arguments_unchanged() {
        let source = FakeSource::with("note", AttrValue::Data(b"hi".to_vec()));
        let reader = XattrReader::new(&source);
        let opts = XattrOptions {
            no_follow: true,
            show_compression: true,
            ..XattrOptions::default()
        };

        reader
            .get_human_readable(Path::new("/some/file"), "note", opts, 7)
            .unwrap();

        let calls = source.calls.borrow();
        assert_eq!(
            calls.as_slice(),
            &[(PathBuf::from("/some/file"), "note".to_string(), opts, 7)]
        );
    }

    #[test]
    fn test_reader_keeps_valid_utf8() {
        let source = FakeSource::with("note", AttrValue::Data("caf\u{e9}".as_bytes().to_vec()));
        let value = XattrReader::new(&source)
            .get_human_readable(Path::new("/f"), "note", XattrOptions::default(), 0)
            .unwrap();
        assert_eq!(value, ReadableValue::Text("caf\u{e9}".to_string()));
    }

    #[test]
    fn test_reader_hex_dumps_invalid_utf8() {
        let raw = vec![0x62, 0x70, 0x6C, 0x69, 0x73, 0x74, 0xFF, 0x00];
        let source = FakeSource::with("plist", AttrValue::Data(raw.clone()));
        let value = XattrReader::new(&source)
            .get_human_readable(Path::new("/f"), "plist", XattrOptions::default(), 0)
            .unwrap();
        assert_eq!(value, ReadableValue::Text(utf8::hex_dump(&raw)));
    }

    #[test]
    fn test_reader_passes_present_and_absent_through() {
        let source = FakeSource::with("flag", AttrValue::Present);
        let reader = XattrReader::new(&source);
        let opts = XattrOptions::default();
        assert_eq!(
            reader.get_human_readable(Path::new("/f"), "flag", opts, 0).unwrap(),
            ReadableValue::Present
        );
        assert_eq!(
            reader.get_human_readable(Path::new("/f"), "other", opts, 0).unwrap(),
            ReadableValue::Absent
        );
    }

    #[test]
    fn test_reader_propagates_source_error() {
        let source = FakeSource::default();
        let err = XattrReader::new(&source)
            .get_human_readable(Path::new("/missing"), "x", XattrOptions::default(), 0)
            .unwrap_err();
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
    }

    #[test]
    fn test_read_all_in_listing_order() {
        let mut source = FakeSource::with("b", AttrValue::Data(vec![0xFF]));
        source.values.insert("a".into(), AttrValue::Data(b"text".to_vec()));
        let all = XattrReader::new(&source)
            .read_all(Path::new("/f"), XattrOptions::default())
            .unwrap();
        assert_eq!(
            all,
            vec![
                ("a".to_string(), ReadableValue::Text("text".into())),
                ("b".to_string(), ReadableValue::Text(utf8::hex_dump(&[0xFF]))),
            ]
        );
    }

    #[test]
    fn test_options_from_names() {
        let opts = XattrOptions::from_names(["noFollow", "show_compression"]).unwrap();
        assert!(opts.no_follow);
        assert!(opts.show_compression);
        assert!(!opts.create_only);

        let err = XattrOptions::from_names(["bogus"]).unwrap_err();
        assert!(matches!(err, XattrError::UnknownOption(name) if name == "bogus"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let err = get("/tmp", "bad\0name", XattrOptions::default(), 0).unwrap_err();
        assert!(matches!(
            err,
            XattrError::InvalidArgument(_) | XattrError::Unsupported { .. }
        ));
    }

    #[cfg(any(target_os = "macos", target_os = "linux"))]
    #[test]
    fn test_nonexistent_path_is_not_found() {
        let err = get("/nonexistent/path/12345", &test_attr("x"), XattrOptions::default(), 0)
            .unwrap_err();
        assert_eq!(err.io_kind(), Some(std::io::ErrorKind::NotFound));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_split_names_and_position() {
        assert_eq!(
            native::split_names(b"user.a\0user.bb\0"),
            vec!["user.a".to_string(), "user.bb".to_string()]
        );
        assert!(native::split_names(b"").is_empty());
        assert_eq!(native::apply_position(b"hello".to_vec(), 2), b"llo".to_vec());
        assert!(native::apply_position(b"hi".to_vec(), 9).is_empty());
    }

    #[cfg(any(target_os = "macos", target_os = "linux"))]
    #[test]
    fn test_native_roundtrip_on_real_file() {
        let file = NamedTempFile::new().unwrap();
        let text = test_attr("text");
        let binary = test_attr("binary");
        let empty = test_attr("empty");

        match set(file.path(), &text, b"hello", XattrOptions::default(), 0) {
            Ok(()) => {}
            // tmpfs and some container filesystems reject user xattrs
            Err(XattrError::Unsupported { .. }) => return,
            Err(XattrError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                return
            }
            Err(e) => panic!("setxattr failed: {e}"),
        }
        set(file.path(), &binary, &[0x00, 0xFF, 0x10], XattrOptions::default(), 0).unwrap();
        set(file.path(), &empty, b"", XattrOptions::default(), 0).unwrap();

        let opts = XattrOptions::default();
        assert_eq!(
            get_human_readable(file.path(), &text, opts, 0).unwrap(),
            ReadableValue::Text("hello".into())
        );
        assert_eq!(
            get_human_readable(file.path(), &binary, opts, 0).unwrap(),
            ReadableValue::Text(utf8::hex_dump(&[0x00, 0xFF, 0x10]))
        );
        assert_eq!(
            get_human_readable(file.path(), &empty, opts, 0).unwrap(),
            ReadableValue::Present
        );
        assert_eq!(
            get_human_readable(file.path(), &test_attr("nope"), opts, 0).unwrap(),
            ReadableValue::Absent
        );

        let names = list(file.path(), opts).unwrap();
        assert!(names.contains(&text));
        assert!(names.contains(&binary));

        let create_only = XattrOptions {
            create_only: true,
            ..XattrOptions::default()
        };
        assert!(set(file.path(), &text, b"again", create_only, 0).is_err());

        remove(file.path(), &text, opts).unwrap();
        assert_eq!(get(file.path(), &text, opts, 0).unwrap(), AttrValue::Absent);
    }
}
