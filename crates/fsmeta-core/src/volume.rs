//! Volume information for every mounted filesystem.
//!
//! [`volume_information`] builds a fresh [`VolumeMap`] on each call from the
//! system mount table plus a `statvfs` per mountpoint. Nothing is cached.
//!
//! Every [`VolumeInfo`] field is optional: a missing key means the property
//! does not apply to that kind of volume (no UUID for a network share, no
//! remount URL for a local disk), not that something failed.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use serde::Serialize;

use crate::mount_table::{self, MountTableError, SystemMount};

/// Default timeout for the per-volume `statvfs` call
pub const DEFAULT_STAT_TIMEOUT: Duration = Duration::from_millis(500);

/// Mountpoint → properties of the volume mounted there.
pub type VolumeMap = BTreeMap<PathBuf, VolumeInfo>;

/// Properties of one mounted volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct VolumeInfo {
    /// Volume name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name suitable for display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub localized_name: Option<String>,
    /// Total size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_capacity: Option<u64>,
    /// Bytes available to unprivileged users
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_capacity: Option<u64>,
    /// Shown in file browsers (not hidden)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_browsable: Option<bool>,
    /// Can be ejected by the user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ejectable: Option<bool>,
    /// Backed by removable media
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_removable: Option<bool>,
    /// Backed by an internal device
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_internal: Option<bool>,
    /// Stored on this machine rather than over the network
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_local: Option<bool>,
    /// Mounted read-only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read_only: Option<bool>,
    /// Mounted on demand by the automounter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_automounted: Option<bool>,
    /// Filesystem UUID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// URL that remounts this network volume
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_for_remounting: Option<String>,
    /// Filesystem type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Mount source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl VolumeInfo {
    /// The properties as a name → value map, omitting absent ones.
    pub fn properties(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

/// Errors enumerating volumes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VolumeError {
    /// The mount table could not be read
    #[error(transparent)]
    MountTable(#[from] MountTableError),
}

/// Describe every mounted volume.
///
/// Hidden volumes (pseudo filesystems, `nobrowse` mounts) are included only
/// when `show_hidden` is set, so the keys without it are always a subset of
/// the keys with it.
pub fn volume_information(show_hidden: bool) -> Result<VolumeMap, VolumeError> {
    let mounts = mount_table::system_mounts()?;
    let devices = DeviceLabels::load();
    tracing::debug!(count = mounts.len(), show_hidden, "enumerating volumes");

    Ok(collect_volumes(mounts, show_hidden, &devices, DEFAULT_STAT_TIMEOUT))
}

/// Keep the top mount of each mountpoint, then drop hidden ones unless asked.
fn collect_volumes(
    mounts: Vec<SystemMount>,
    show_hidden: bool,
    devices: &DeviceLabels,
    timeout: Duration,
) -> VolumeMap {
    // Later entries are mounted on top of earlier ones
    let top: BTreeMap<PathBuf, SystemMount> = mounts
        .into_iter()
        .map(|mount| (mount.mountpoint.clone(), mount))
        .collect();

    top.into_iter()
        .filter_map(|(mountpoint, mount)| {
            let hidden = is_hidden(&mount);
            (show_hidden || !hidden)
                .then(|| (mountpoint, describe(&mount, hidden, devices, timeout)))
        })
        .collect()
}

fn describe(
    mount: &SystemMount,
    hidden: bool,
    devices: &DeviceLabels,
    timeout: Duration,
) -> VolumeInfo {
    let stats = filesystem_stats(&mount.mountpoint, timeout);
    let device_path = Path::new(&mount.fsname);
    let label = devices.label(device_path);
    let name = label.or_else(|| volume_name(&mount.mountpoint));
    let local = !is_network_fstype(&mount.fstype);
    let removable = if local {
        removable_flag(Path::new(SYS_CLASS_BLOCK), device_path)
    } else {
        None
    };

    VolumeInfo {
        localized_name: name.clone(),
        name,
        total_capacity: stats.map(|s| s.total),
        available_capacity: stats.map(|s| s.available),
        is_browsable: Some(!hidden),
        is_ejectable: removable,
        is_removable: removable,
        is_internal: removable.map(|r| !r),
        is_local: Some(local),
        is_read_only: Some(
            stats.is_some_and(|s| s.read_only)
                || mount.has_option("ro")
                || mount.has_option("read-only"),
        ),
        is_automounted: cfg!(target_os = "macos").then(|| mount.has_option("automounted")),
        uuid: devices.uuid(device_path),
        url_for_remounting: remount_url(&mount.fstype, &mount.fsname),
        format: Some(mount.fstype.clone()),
        device: Some(mount.fsname.clone()),
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Filesystem types that never represent user-visible storage.
const PSEUDO_FSTYPES: &[&str] = &[
    "autofs",
    "binfmt_misc",
    "bpf",
    "cgroup",
    "cgroup2",
    "configfs",
    "debugfs",
    "devfs",
    "devpts",
    "devtmpfs",
    "efivarfs",
    "fusectl",
    "hugetlbfs",
    "mqueue",
    "nsfs",
    "proc",
    "pstore",
    "ramfs",
    "rpc_pipefs",
    "securityfs",
    "selinuxfs",
    "sysfs",
    "tracefs",
];

/// Mountpoint prefixes reserved for the system on Linux.
const HIDDEN_PREFIXES: &[&str] = &["/proc", "/sys", "/dev", "/run", "/snap", "/boot/efi"];

/// Prefixes under [`HIDDEN_PREFIXES`] that hold user media.
const VISIBLE_PREFIXES: &[&str] = &["/run/media"];

/// Network filesystem types (local == false).
const NETWORK_FSTYPES: &[&str] = &[
    "9p", "afpfs", "ceph", "cifs", "davfs", "fuse.sshfs", "glusterfs", "ncpfs", "nfs", "nfs4",
    "smb3", "smbfs", "sshfs", "webdav",
];

/// Returns `true` for volumes that file browsers do not show.
pub fn is_hidden(mount: &SystemMount) -> bool {
    if PSEUDO_FSTYPES.contains(&mount.fstype.as_str()) || mount.has_option("nobrowse") {
        return true;
    }
    if cfg!(target_os = "linux") {
        let under = |prefix: &&str| mount.mountpoint.starts_with(prefix);
        return HIDDEN_PREFIXES.iter().any(under) && !VISIBLE_PREFIXES.iter().any(under);
    }
    false
}

/// Returns `true` for filesystems reached over the network.
pub fn is_network_fstype(fstype: &str) -> bool {
    let fstype = fstype.to_lowercase();
    NETWORK_FSTYPES.contains(&fstype.as_str())
}

/// URL that would mount the same network share again.
///
/// - `//user@host/share` on smbfs/cifs → `smb://user@host/share`
/// - `//host/share` on afpfs → `afp://host/share`
/// - `host:/export` on nfs → `nfs://host/export`
/// - webdav sources are URLs already
pub fn remount_url(fstype: &str, fsname: &str) -> Option<String> {
    match fstype.to_lowercase().as_str() {
        "smbfs" | "cifs" | "smb3" => fsname.strip_prefix("//").map(|s| format!("smb://{s}")),
        "afpfs" => fsname.strip_prefix("//").map(|s| format!("afp://{s}")),
        "nfs" | "nfs4" => {
            let (host, export) = fsname.split_once(':')?;
            Some(format!("nfs://{host}{export}"))
        }
        "webdav" | "davfs" => (fsname.starts_with("http://") || fsname.starts_with("https://"))
            .then(|| fsname.to_string()),
        _ => None,
    }
}

fn volume_name(mountpoint: &Path) -> Option<String> {
    match mountpoint.file_name() {
        Some(name) => Some(name.to_string_lossy().into_owned()),
        None => Some(mountpoint.display().to_string()),
    }
}

// ============================================================================
// Capacity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FsStats {
    total: u64,
    available: u64,
    read_only: bool,
}

/// `statvfs` the mountpoint without hanging on an unresponsive server.
///
/// Returns `None` on error or timeout; the volume is still listed, just
/// without capacity.
fn filesystem_stats(mountpoint: &Path, timeout: Duration) -> Option<FsStats> {
    use nix::sys::statvfs::{statvfs, FsFlags};

    let path = mountpoint.to_path_buf();
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        let result = statvfs(&path).map(|st| {
            let fragment = u64::from(st.fragment_size());
            FsStats {
                total: u64::from(st.blocks()).saturating_mul(fragment),
                available: u64::from(st.blocks_available()).saturating_mul(fragment),
                read_only: st.flags().contains(FsFlags::ST_RDONLY),
            }
        });
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(stats)) => Some(stats),
        Ok(Err(errno)) => {
            tracing::debug!(mountpoint = %mountpoint.display(), %errno, "statvfs failed");
            None
        }
        Err(_) => {
            tracing::warn!(
                "statvfs on {} did not answer within {:?}; omitting capacity",
                mountpoint.display(),
                timeout
            );
            None
        }
    }
}

// ============================================================================
// Block device metadata (Linux)
// ============================================================================

const SYS_CLASS_BLOCK: &str = "/sys/class/block";
const DISK_BY_UUID: &str = "/dev/disk/by-uuid";
const DISK_BY_LABEL: &str = "/dev/disk/by-label";

/// UUIDs and labels of block devices, keyed by canonical device path.
#[derive(Debug, Default)]
struct DeviceLabels {
    uuids: HashMap<PathBuf, String>,
    labels: HashMap<PathBuf, String>,
}

impl DeviceLabels {
    fn load() -> Self {
        Self {
            uuids: read_link_dir(Path::new(DISK_BY_UUID)),
            labels: read_link_dir(Path::new(DISK_BY_LABEL)),
        }
    }

    fn uuid(&self, device: &Path) -> Option<String> {
        Self::lookup(&self.uuids, device)
    }

    fn label(&self, device: &Path) -> Option<String> {
        Self::lookup(&self.labels, device)
    }

    fn lookup(map: &HashMap<PathBuf, String>, device: &Path) -> Option<String> {
        if map.is_empty() || !device.is_absolute() {
            return None;
        }
        let device = device.canonicalize().ok()?;
        map.get(&device).cloned()
    }
}

/// Map each symlink target in `dir` to the (unescaped) link name.
///
/// udev names links like `/dev/disk/by-label/My\x20Disk`.
fn read_link_dir(dir: &Path) -> HashMap<PathBuf, String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return HashMap::new();
    };

    entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let target = entry.path().canonicalize().ok()?;
            let name = unescape_udev(&entry.file_name().to_string_lossy());
            Some((target, name))
        })
        .collect()
}

fn unescape_udev(name: &str) -> String {
    let mut out = Vec::with_capacity(name.len());
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && bytes.get(i + 1) == Some(&b'x')
            && let Some(hex) = name.get(i + 2..i + 4)
            && let Ok(byte) = u8::from_str_radix(hex, 16)
        {
            out.push(byte);
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Read the `removable` flag of a block device from sysfs.
///
/// Partitions carry no flag of their own; the parent disk's is used.
fn removable_flag(sys_block: &Path, device: &Path) -> Option<bool> {
    let dev_name = device.strip_prefix("/dev").ok()?.file_name()?;
    let node = sys_block.join(dev_name).canonicalize().ok()?;

    let disk = if node.join("partition").exists() {
        node.parent()?.to_path_buf()
    } else {
        node
    };

    let flag = std::fs::read_to_string(disk.join("removable")).ok()?;
    match flag.trim() {
        "1" => Some(true),
        "0" => Some(false),
        _ => None,
    }
}
