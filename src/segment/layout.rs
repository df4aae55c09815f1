//! Byte layout of the shared time segment
//!
//! The structure below is shared with every producer (gpsd, chrony's
//! SOCK/SHM writers, hand-rolled daemons). Field order and widths must not
//! change; new modes may only reuse the reserved area.

use std::mem::size_of;

/// Base of the SysV IPC key. `0x4e545030` is ASCII "NTP0"; unit `n` uses
/// `SHM_KEY_BASE + n`.
pub const SHM_KEY_BASE: i32 = 0x4e54_5030;

/// Units below this index get owner-only permissions, the rest are world
/// writable so unprivileged producers can post samples.
pub const RESTRICTED_UNITS: u32 = 2;

/// Permissions for restricted units
pub const RESTRICTED_PERMISSIONS: u32 = 0o600;

/// Permissions for open units
pub const OPEN_PERMISSIONS: u32 = 0o666;

/// Mode tag: values are used as-is when `valid` is set
pub const MODE_UNGUARDED: i32 = 0;

/// Mode tag: values are used only if `count` is unchanged across the read
pub const MODE_GUARDED: i32 = 1;

/// Number of reserved trailing words
pub const RESERVED_WORDS: usize = 8;

/// Size in bytes of the segment every unit maps
pub const SEGMENT_SIZE: usize = size_of::<ShmTime>();

/// The shared time segment
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ShmTime {
    /// Read discipline: [`MODE_UNGUARDED`] or [`MODE_GUARDED`]
    pub mode: i32,
    /// Sequence counter, bumped by the producer around each write (guarded mode)
    pub count: i32,
    /// Reference clock time, seconds
    pub clock_sec: libc::time_t,
    /// Reference clock time, microseconds
    pub clock_usec: i32,
    /// Local receive time, seconds
    pub receive_sec: libc::time_t,
    /// Local receive time, microseconds
    pub receive_usec: i32,
    /// Leap indicator
    pub leap: i32,
    /// Precision as a power of two exponent
    pub precision: i32,
    /// Informational sample depth hint
    pub nsamples: i32,
    /// Set by the producer when a sample is posted, cleared by the consumer
    pub valid: i32,
    /// Reference clock time, nanoseconds (truncates to `clock_usec`)
    pub clock_nsec: u32,
    /// Local receive time, nanoseconds (truncates to `receive_usec`)
    pub receive_nsec: u32,
    /// Reserved for future modes
    pub dummy: [i32; RESERVED_WORDS],
}

/// IPC key for a unit
///
/// Large units wrap instead of failing, as every producer computes the key
/// the same way.
pub fn segment_key(unit: u32) -> i32 {
    SHM_KEY_BASE.wrapping_add(unit as i32)
}

/// Creation permissions for a unit
pub fn segment_permissions(unit: u32) -> u32 {
    if unit < RESTRICTED_UNITS {
        RESTRICTED_PERMISSIONS
    } else {
        OPEN_PERMISSIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn test_key_derivation() {
        assert_eq!(segment_key(0), 0x4e545030);
        assert_eq!(segment_key(3), 0x4e545033);
        assert_ne!(segment_key(1), segment_key(2));
    }

    #[test]
    fn test_permissions() {
        assert_eq!(segment_permissions(0), 0o600);
        assert_eq!(segment_permissions(1), 0o600);
        assert_eq!(segment_permissions(2), 0o666);
        assert_eq!(segment_permissions(255), 0o666);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_layout_offsets_lp64() {
        assert_eq!(offset_of!(ShmTime, mode), 0);
        assert_eq!(offset_of!(ShmTime, count), 4);
        assert_eq!(offset_of!(ShmTime, clock_sec), 8);
        assert_eq!(offset_of!(ShmTime, clock_usec), 16);
        assert_eq!(offset_of!(ShmTime, receive_sec), 24);
        assert_eq!(offset_of!(ShmTime, receive_usec), 32);
        assert_eq!(offset_of!(ShmTime, leap), 36);
        assert_eq!(offset_of!(ShmTime, precision), 40);
        assert_eq!(offset_of!(ShmTime, nsamples), 44);
        assert_eq!(offset_of!(ShmTime, valid), 48);
        assert_eq!(offset_of!(ShmTime, clock_nsec), 52);
        assert_eq!(offset_of!(ShmTime, receive_nsec), 56);
        assert_eq!(offset_of!(ShmTime, dummy), 60);
        assert_eq!(SEGMENT_SIZE, 96);
    }
}
