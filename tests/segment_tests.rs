//! Integration tests for segment configuration, attachment and handles

use std::fs;

use tempfile::TempDir;
use shmclock::{
    protocol::{Publication, ReadMode, ReadOutcome, SampleProtocolReader, SegmentPublisher},
    segment::{layout, segment_key, segment_permissions},
    AttachedSegment, BackingType, PrivateSegment, SegmentAccess, SegmentConfig, SegmentHandle,
    SegmentProvider, ShmClockError, SystemSegmentProvider, Timestamp,
};

fn file_config(dir: &TempDir, name: &str) -> SegmentConfig {
    SegmentConfig::new(BackingType::FileBacked).with_file_path(dir.path().join(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_keys_and_permissions() {
        assert_eq!(segment_key(0), 0x4e54_5030);
        assert_eq!(segment_key(3), 0x4e54_5033);
        assert_eq!(segment_permissions(0), 0o600);
        assert_eq!(segment_permissions(1), 0o600);
        assert_eq!(segment_permissions(2), 0o666);
        assert_eq!(segment_permissions(255), 0o666);
    }

    #[test]
    fn test_config_rejects_stray_permission_bits() {
        let config = SegmentConfig::default().with_permissions(0o4755);
        assert!(config.validate().is_err());
        assert!(SegmentConfig::default().with_permissions(0o640).validate().is_ok());
    }

    #[test]
    fn test_file_backed_segment_created_at_full_size() {
        let temp_dir = TempDir::new().unwrap();
        let config = file_config(&temp_dir, "ntp0");

        let segment = AttachedSegment::attach(0, &config).unwrap();
        assert!(!segment.is_sysv());
        assert_eq!(segment.unit(), 0);
        assert_eq!(segment.valid(), 0);

        let len = fs::metadata(temp_dir.path().join("ntp0")).unwrap().len();
        assert_eq!(len, layout::SEGMENT_SIZE as u64);
    }

    #[test]
    fn test_missing_file_without_create_fails() {
        let temp_dir = TempDir::new().unwrap();
        let config = file_config(&temp_dir, "absent").with_create(false);

        let err = AttachedSegment::attach(1, &config).unwrap_err();
        assert!(matches!(err, ShmClockError::Io { .. }));
    }

    #[test]
    fn test_two_attachments_see_the_same_sample() {
        let temp_dir = TempDir::new().unwrap();
        let config = file_config(&temp_dir, "ntp2");

        let producer = AttachedSegment::attach(2, &config).unwrap();
        let consumer = AttachedSegment::attach(2, &config.clone().with_create(false)).unwrap();

        SegmentPublisher::new(producer.view(), ReadMode::Guarded).publish(
            &Publication::from_timestamps(Timestamp::new(1_700_000_000, 5_000), Timestamp::new(1_700_000_001, 7_000)),
        );
        assert_eq!(consumer.valid(), 1);

        match SampleProtocolReader::new().read(&consumer) {
            ReadOutcome::Sample(sample) => {
                assert_eq!(sample.clock, Timestamp::new(1_700_000_000, 5_000));
                assert_eq!(sample.receive, Timestamp::new(1_700_000_001, 7_000));
            }
            other => panic!("expected sample, got {:?}", other),
        }
        assert_eq!(producer.valid(), 0);
    }

    #[test]
    fn test_segment_survives_reattach() {
        let temp_dir = TempDir::new().unwrap();
        let config = file_config(&temp_dir, "ntp3");

        {
            let segment = AttachedSegment::attach(3, &config).unwrap();
            segment.view().store_precision(-12);
        }

        let segment = AttachedSegment::attach(3, &config).unwrap();
        assert_eq!(segment.precision(), -12);
    }

    #[test]
    fn test_handle_attaches_lazily_through_system_provider() {
        let temp_dir = TempDir::new().unwrap();
        let provider = SystemSegmentProvider::new(file_config(&temp_dir, "ntp4"));
        let mut handle = SegmentHandle::new(4, provider);

        assert!(!handle.is_attached());
        assert!(handle.ensure().is_some());
        assert!(handle.is_attached());
        assert_eq!(handle.failed_attempts(), 0);

        handle.release();
        assert!(!handle.is_attached());
        handle.release();
        assert!(handle.acquire().is_ok());
    }

    #[test]
    fn test_handle_counts_failures_until_attach() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("late");
        let provider =
            SystemSegmentProvider::new(file_config(&temp_dir, "late").with_create(false));
        let mut handle = SegmentHandle::new(5, provider);

        assert!(handle.ensure().is_none());
        assert!(handle.acquire().is_err());
        assert_eq!(handle.failed_attempts(), 2);

        // Producer shows up.
        fs::write(&path, vec![0u8; layout::SEGMENT_SIZE]).unwrap();
        assert!(handle.ensure().is_some());
        assert_eq!(handle.failed_attempts(), 0);
    }

    #[test]
    fn test_private_segment_provider_shares_memory() {
        let mut producer = PrivateSegment::new();
        let consumer = producer.acquire(0).unwrap();

        producer.view().store_nsamples(3);
        assert_eq!(consumer.nsamples(), 3);

        consumer.prime(-1, 5);
        assert_eq!(producer.precision(), -1);
        assert_eq!(producer.nsamples(), 5);
        assert_eq!(producer.valid(), 0);
    }
}
