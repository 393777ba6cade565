//! Device-path resolution.
//!
//! Drop events carry the executable path in device-namespace form
//! (`\Device\HarddiskVolume3\app.exe`). The resolver maps that form back to a
//! drive-letter path by enumerating the mounted drives and matching each
//! drive's device target as a case-insensitive prefix of the event path.
//!
//! Resolution is deterministic and keeps no shared state; concurrent calls
//! from multiple event-source threads are safe.

/// The maximum extended path length, in characters.
pub const MAX_EXT_PATH: usize = 32_767;

/// Read access to the host's drive-letter table.
///
/// Implemented by the platform layer (on Windows: `GetLogicalDrives` plus
/// `QueryDosDeviceW`) and by fixed in-memory tables in tests.
pub trait DriveTable {
    /// Bitmask of mounted drives: bit `i` set means drive `'A' + i` exists.
    fn logical_drives(&self) -> u32;

    /// The device-namespace target for a drive such as `"C:"`, or `None` if
    /// the target cannot be obtained.
    fn device_target(&self, drive: &str) -> Option<String>;
}

/// Resolves a device-namespace path to a drive-letter path.
///
/// Walks the 26 possible drive letters in order and returns the first match.
/// The drive's device target must be a proper prefix of `device_path`
/// (compared case-insensitively): the character following the prefix is
/// treated as the separator and skipped. The result is truncated to
/// [`MAX_EXT_PATH`] characters.
///
/// Returns `None` when no mounted drive matches, which callers treat as a
/// non-actionable event.
pub fn resolve_device_path(table: &dyn DriveTable, device_path: &str) -> Option<String> {
    let drives = table.logical_drives();

    for i in 0..26u32 {
        if drives & (1 << i) == 0 {
            continue;
        }

        let letter = char::from(b'A' + i as u8);
        let Some(target) = table.device_target(&format!("{letter}:")) else {
            continue;
        };
        if target.is_empty() {
            continue;
        }

        let Some(consumed) = prefix_len_ignore_case(device_path, &target) else {
            continue;
        };

        // The device target must be a proper prefix: the event path has to
        // continue past it with a separator and a file name.
        let remainder = &device_path[consumed..];
        let Some(sep) = remainder.chars().next() else {
            continue;
        };

        let remainder = &remainder[sep.len_utf8()..];
        return Some(truncate_chars(
            format!("{letter}:\\{remainder}"),
            MAX_EXT_PATH,
        ));
    }

    None
}

/// Returns the byte length of `prefix` within `path` when `prefix` matches
/// the start of `path` case-insensitively, or `None` on mismatch.
fn prefix_len_ignore_case(path: &str, prefix: &str) -> Option<usize> {
    let mut path_chars = path.chars();
    let mut consumed = 0;

    for expected in prefix.chars() {
        let actual = path_chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        consumed += actual.len_utf8();
    }

    Some(consumed)
}

fn truncate_chars(mut s: String, max_chars: usize) -> String {
    if let Some((cut, _)) = s.char_indices().nth(max_chars) {
        s.truncate(cut);
    }
    s
}
