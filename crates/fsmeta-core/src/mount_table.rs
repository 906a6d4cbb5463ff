//! System mount table access.
//!
//! # Platform Differences
//!
//! - **macOS**: Parse `mount` command output
//! - **Linux**: Parse `/proc/mounts`
//! - **Other**: Empty table

use std::path::PathBuf;

/// One entry of the system mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemMount {
    /// The mount point path (e.g., `/Volumes/Backup`)
    pub mountpoint: PathBuf,
    /// The filesystem type (e.g., `apfs`, `ext4`, `smbfs`)
    pub fstype: String,
    /// The mount source (e.g., `/dev/disk3s1`, `//user@nas/share`)
    pub fsname: String,
    /// Mount options, without the filesystem type
    pub options: Vec<String>,
}

impl SystemMount {
    /// Returns `true` if `option` appears in the mount options.
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }
}

/// Errors reading the mount table.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MountTableError {
    /// The mount table source could not be read
    #[error("Failed to read mount table: {0}")]
    Unavailable(String),
}

/// Get all system mounts.
///
/// Entries appear in mount table order; a mountpoint that is mounted over
/// appears more than once.
pub fn system_mounts() -> Result<Vec<SystemMount>, MountTableError> {
    #[cfg(target_os = "macos")]
    {
        get_system_mounts_macos()
    }

    #[cfg(target_os = "linux")]
    {
        get_system_mounts_linux()
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        // Unsupported platform - return empty list
        Ok(Vec::new())
    }
}

// ============================================================================
// Platform-specific implementations
// ============================================================================

/// Timeout for mount command execution.
/// Ghost mounts can cause the mount command to block indefinitely.
#[cfg(target_os = "macos")]
const MOUNT_COMMAND_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

/// Parse macOS mount output.
///
/// Uses timeout protection because the `mount` command can block
/// indefinitely when a network or FUSE server stops answering. The
/// process is killed on timeout and an empty list is returned with a
/// warning.
#[cfg(target_os = "macos")]
#[allow(unsafe_code)]
fn get_system_mounts_macos() -> Result<Vec<SystemMount>, MountTableError> {
    use std::process::{Command, Stdio};
    use std::sync::mpsc;

    let child = Command::new("mount")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| MountTableError::Unavailable(format!("failed to spawn mount: {e}")))?;

    let (tx, rx) = mpsc::channel();
    let child_id = child.id();

    std::thread::spawn(move || {
        let result = child.wait_with_output();
        let _ = tx.send(result);
    });

    match rx.recv_timeout(MOUNT_COMMAND_TIMEOUT) {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            Ok(stdout.lines().filter_map(parse_macos_mount_line).collect())
        }
        Ok(Err(e)) => Err(MountTableError::Unavailable(format!("mount command failed: {e}"))),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            // SAFETY: child_id came from Child::id() of a process we spawned.
            unsafe {
                libc::kill(i32::try_from(child_id).unwrap_or(-1), libc::SIGKILL);
            }
            tracing::warn!(
                "Mount command timed out after {:?} - possible unresponsive mounts. \
                 Returning empty mount list.",
                MOUNT_COMMAND_TIMEOUT
            );
            Ok(Vec::new())
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            tracing::warn!("Mount command thread terminated unexpectedly. Returning empty mount list.");
            Ok(Vec::new())
        }
    }
}

/// Parse one line of macOS `mount` output.
///
/// Format: `{fsname} on {mountpoint} ({fstype}, {options...})`
/// Example: `/dev/disk3s5 on /System/Volumes/Data (apfs, local, journaled, nobrowse)`
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_macos_mount_line(line: &str) -> Option<SystemMount> {
    let on_idx = line.find(" on ")?;
    let fsname = line[..on_idx].to_string();

    let rest = &line[on_idx + 4..];
    // Mountpoints may contain " (", so split on the last one
    let paren_idx = rest.rfind(" (")?;
    let mountpoint = PathBuf::from(&rest[..paren_idx]);

    let opts = rest[paren_idx + 2..].strip_suffix(')')?;
    let mut parts = opts.split(',').map(str::trim);

    // First option is the fstype
    let fstype = parts.next()?.to_string();
    let options = parts
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    Some(SystemMount {
        mountpoint,
        fstype,
        fsname,
        options,
    })
}

/// Read Linux /proc/mounts.
#[cfg(target_os = "linux")]
fn get_system_mounts_linux() -> Result<Vec<SystemMount>, MountTableError> {
    let contents = std::fs::read_to_string("/proc/mounts")
        .map_err(|e| MountTableError::Unavailable(format!("/proc/mounts: {e}")))?;

    Ok(contents.lines().filter_map(parse_linux_mount_line).collect())
}

/// Parse one line of /proc/mounts.
///
/// Format: `{device} {mountpoint} {fstype} {options} {dump} {pass}`
/// Example: `/dev/sdb1 /run/media/me/USB vfat rw,nosuid,nodev 0 0`
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_linux_mount_line(line: &str) -> Option<SystemMount> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }

    let options = parts
        .get(3)
        .map(|opts| opts.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    Some(SystemMount {
        fsname: unescape_mount_path(parts[0]),
        mountpoint: PathBuf::from(unescape_mount_path(parts[1])),
        fstype: parts[2].to_string(),
        options,
    })
}

/// Unescape special characters in mount paths from /proc/mounts.
///
/// /proc/mounts uses octal escapes for special characters:
/// - `\040` = space
/// - `\011` = tab
/// - `\012` = newline
/// - `\134` = backslash
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn unescape_mount_path(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\'
            && let Some(octal) = bytes.get(i + 1..i + 4)
            && octal.iter().all(|b| (b'0'..=b'7').contains(b))
        {
            let code = octal
                .iter()
                .fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
            if let Ok(byte) = u8::try_from(code) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
