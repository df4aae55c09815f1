//! Platform attachment of unit segments

use std::{
    cell::UnsafeCell,
    fs::OpenOptions,
    os::unix::fs::OpenOptionsExt,
    ptr::NonNull,
    sync::Arc,
};

use log::{debug, error, warn};
use memmap2::{MmapMut, MmapOptions};
use nix::errno::Errno;

use crate::error::{Result, ShmClockError};

use super::{
    config::{BackingType, SegmentConfig},
    handle::SegmentProvider,
    layout::{segment_key, ShmTime, SEGMENT_SIZE},
    view::{forward_segment_access, ShmView},
};

/// What keeps an attached segment's memory alive
#[derive(Debug)]
enum Backing {
    /// SysV attachment; detached on drop
    SysV { shmid: libc::c_int },
    /// File mapping; unmapped on drop
    Mapped { _mmap: MmapMut },
}

/// A segment attached to this process
#[derive(Debug)]
pub struct AttachedSegment {
    unit: u32,
    view: ShmView,
    backing: Backing,
}

impl AttachedSegment {
    /// Attach the segment for `unit` as described by `config`
    pub fn attach(unit: u32, config: &SegmentConfig) -> Result<Self> {
        config.validate()?;

        match config.backing_type {
            BackingType::SysV => Self::attach_sysv(unit, config),
            BackingType::FileBacked => Self::attach_file(unit, config),
        }
    }

    fn attach_sysv(unit: u32, config: &SegmentConfig) -> Result<Self> {
        let key = segment_key(unit) as libc::key_t;
        let mut flags = config.permissions_for(unit) as libc::c_int;
        if config.create {
            flags |= libc::IPC_CREAT;
        }

        let shmid = unsafe { libc::shmget(key, SEGMENT_SIZE, flags) };
        if shmid == -1 {
            let errno = Errno::last();
            error!("SHM shmget (unit {}): {}", unit, errno);
            return Err(ShmClockError::segment_unavailable(
                unit,
                format!("shmget: {}", errno),
            ));
        }

        let addr = unsafe { libc::shmat(shmid, std::ptr::null(), 0) };
        if addr as isize == -1 {
            let errno = Errno::last();
            error!("SHM shmat (unit {}): {}", unit, errno);
            return Err(ShmClockError::segment_unavailable(
                unit,
                format!("shmat: {}", errno),
            ));
        }

        let ptr = NonNull::new(addr as *mut ShmTime)
            .ok_or_else(|| ShmClockError::platform("shmat returned a null address"))?;

        debug!("SHM unit {} attached (key {:#x}, id {})", unit, key, shmid);
        Ok(Self {
            unit,
            view: unsafe { ShmView::from_raw(ptr) },
            backing: Backing::SysV { shmid },
        })
    }

    fn attach_file(unit: u32, config: &SegmentConfig) -> Result<Self> {
        let path = config.file_path_for(unit);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(config.create)
            .truncate(false)
            .mode(config.permissions_for(unit))
            .open(&path)
            .map_err(|e| {
                error!("SHM open {} (unit {}): {}", path.display(), unit, e);
                ShmClockError::from_io(e, "Failed to open segment file")
            })?;

        let len = file
            .metadata()
            .map_err(|e| ShmClockError::from_io(e, "Failed to stat segment file"))?
            .len();
        if len < SEGMENT_SIZE as u64 {
            if !config.create {
                error!("SHM segment file {} too small (unit {})", path.display(), unit);
                return Err(ShmClockError::layout_mismatch(SEGMENT_SIZE, len as usize));
            }
            file.set_len(SEGMENT_SIZE as u64)
                .map_err(|e| ShmClockError::from_io(e, "Failed to set segment file size"))?;
        }

        let mut mmap = unsafe {
            MmapOptions::new()
                .len(SEGMENT_SIZE)
                .map_mut(&file)
                .map_err(|e| {
                    error!("SHM mmap {} (unit {}): {}", path.display(), unit, e);
                    ShmClockError::from_io(e, "Failed to map segment file")
                })?
        };

        let ptr = NonNull::new(mmap.as_mut_ptr() as *mut ShmTime)
            .ok_or_else(|| ShmClockError::platform("mmap returned a null address"))?;

        debug!("SHM unit {} mapped from {}", unit, path.display());
        Ok(Self {
            unit,
            view: unsafe { ShmView::from_raw(ptr) },
            backing: Backing::Mapped { _mmap: mmap },
        })
    }

    /// Volatile view of the segment
    pub fn view(&self) -> &ShmView {
        &self.view
    }

    /// Unit index this segment belongs to
    pub fn unit(&self) -> u32 {
        self.unit
    }

    /// Check if the segment is a SysV attachment
    pub fn is_sysv(&self) -> bool {
        matches!(self.backing, Backing::SysV { .. })
    }
}

impl Drop for AttachedSegment {
    fn drop(&mut self) {
        if let Backing::SysV { shmid } = self.backing {
            let rc = unsafe { libc::shmdt(self.view.as_ptr() as *const libc::c_void) };
            if rc == -1 {
                warn!("SHM shmdt (unit {}, id {}): {}", self.unit, shmid, Errno::last());
            }
        }
    }
}

forward_segment_access!(AttachedSegment);

/// Provider attaching real segments through the configured backing
#[derive(Debug, Clone, Default)]
pub struct SystemSegmentProvider {
    config: SegmentConfig,
}

impl SystemSegmentProvider {
    pub fn new(config: SegmentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SegmentConfig {
        &self.config
    }
}

impl SegmentProvider for SystemSegmentProvider {
    type Segment = AttachedSegment;

    fn acquire(&mut self, unit: u32) -> Result<AttachedSegment> {
        AttachedSegment::attach(unit, &self.config)
    }
}

/// Process-private segment on the heap
///
/// Clones share the same memory, so one clone can play the producer while
/// another is handed to a driver. It is also its own [`SegmentProvider`],
/// returning a shared clone on every acquire.
#[derive(Debug, Clone)]
pub struct PrivateSegment {
    _cell: Arc<UnsafeCell<ShmTime>>,
    view: Arc<ShmView>,
}

impl PrivateSegment {
    /// Allocate a zeroed segment
    pub fn new() -> Self {
        let cell = Arc::new(UnsafeCell::new(ShmTime::default()));
        // Arc payloads are never null.
        let ptr = unsafe { NonNull::new_unchecked(cell.get()) };
        Self {
            view: Arc::new(unsafe { ShmView::from_raw(ptr) }),
            _cell: cell,
        }
    }

    /// Volatile view of the segment
    pub fn view(&self) -> &ShmView {
        &self.view
    }
}

impl Default for PrivateSegment {
    fn default() -> Self {
        Self::new()
    }
}

forward_segment_access!(PrivateSegment);

impl SegmentProvider for PrivateSegment {
    type Segment = PrivateSegment;

    fn acquire(&mut self, _unit: u32) -> Result<PrivateSegment> {
        Ok(self.clone())
    }
}
