//! Shared time segment: layout, attachment and field access

pub mod layout;
pub mod view;
pub mod config;
pub mod attach;
pub mod handle;

pub use layout::{segment_key, segment_permissions, ShmTime, SEGMENT_SIZE, SHM_KEY_BASE};
pub use view::{RawStamp, SegmentAccess, ShmView};
pub use config::{BackingType, SegmentConfig};
pub use attach::{AttachedSegment, PrivateSegment, SystemSegmentProvider};
pub use handle::{SegmentHandle, SegmentProvider};
