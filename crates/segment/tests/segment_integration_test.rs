use segment::layout::{MAX_DETECTIONS, SEGMENT_SIZE};
use segment::{BoundingBox, DetectionSnapshot, SegmentError, SegmentKey, SegmentReader, SegmentWriter};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn key_for(dir: &Path, name: &str, project_id: i32) -> SegmentKey {
    let token = dir.join(name);
    fs::write(&token, b"token").unwrap();
    SegmentKey::derive(&token, project_id).unwrap()
}

fn sample_box(seed: i32) -> BoundingBox {
    BoundingBox {
        x: seed * 10,
        y: seed * 10,
        width: 50,
        height: 50,
        confidence: 0.85,
    }
}

/// Test basic writer-reader visibility through a real segment
///
/// Tests:
/// - Attach fails with NotFound before the segment exists
/// - Fresh segment decodes as frame 0, no boxes, not complete
/// - Published snapshots become visible to the reader
/// - mark_complete() flips only the completion flag
#[test]
fn test_writer_reader_visibility() {
    let dir = tempdir().unwrap();
    let key = key_for(dir.path(), "visibility", 1);

    // TEST 1: nothing to attach to yet
    match SegmentReader::attach(key) {
        Err(SegmentError::NotFound { .. }) => {}
        _ => panic!("Attach should fail before the segment is created"),
    }

    let mut writer = SegmentWriter::create(key).unwrap();
    let reader = SegmentReader::attach(key).unwrap();

    // TEST 2: fresh segment is fully zeroed
    let snapshot = reader.snapshot().unwrap();
    assert_eq!(snapshot.frame_number, 0, "Fresh segment starts at frame 0");
    assert!(snapshot.detections.is_empty(), "Fresh segment has no boxes");
    assert!(!snapshot.processing_complete, "Fresh segment is not complete");

    // TEST 3: a published snapshot round-trips through the segment
    let published = DetectionSnapshot {
        frame_number: 12,
        detections: vec![sample_box(1), sample_box(2), sample_box(3)],
        processing_complete: false,
    };
    writer.publish(&published);

    let snapshot = reader.snapshot().unwrap();
    assert_eq!(snapshot, published, "Reader should see the published state");

    // TEST 4: completion flag flips without disturbing the rest
    writer.mark_complete();
    let snapshot = reader.snapshot().unwrap();
    assert!(snapshot.processing_complete, "Flag should now be set");
    assert_eq!(snapshot.frame_number, 12, "Frame number must survive the flag store");
    assert_eq!(snapshot.detections.len(), 3, "Boxes must survive the flag store");
}

/// Test that the writer clamps oversized batches like the detector does
#[test]
fn test_publish_clamps_to_capacity() {
    let dir = tempdir().unwrap();
    let key = key_for(dir.path(), "clamp", 2);

    let mut writer = SegmentWriter::create(key).unwrap();
    let reader = SegmentReader::attach(key).unwrap();

    let oversized = DetectionSnapshot {
        frame_number: 5,
        detections: (0..MAX_DETECTIONS as i32 + 10).map(sample_box).collect(),
        processing_complete: false,
    };
    writer.publish(&oversized);

    let snapshot = reader.snapshot().unwrap();
    assert_eq!(
        snapshot.detections.len(),
        MAX_DETECTIONS,
        "Published batch should be clamped to capacity"
    );
}

/// Test recovery after a corrupt detection count
///
/// Tests:
/// - snapshot() surfaces CorruptCount for an out-of-range count
/// - The reader stays attached and recovers once the writer fixes the segment
#[test]
fn test_corrupt_count_is_recoverable() {
    let dir = tempdir().unwrap();
    let key = key_for(dir.path(), "corrupt", 3);

    let mut writer = SegmentWriter::create(key).unwrap();
    let reader = SegmentReader::attach(key).unwrap();

    let mut raw = [0u8; SEGMENT_SIZE];
    raw[4..8].copy_from_slice(&200i32.to_le_bytes());
    writer.publish_raw(&raw);

    match reader.snapshot() {
        Err(SegmentError::CorruptCount(200)) => {}
        other => panic!("Expected CorruptCount(200), got {:?}", other),
    }

    // Same reader, no re-attach: the next good write must decode cleanly.
    writer.publish(&DetectionSnapshot {
        frame_number: 8,
        detections: vec![sample_box(4)],
        processing_complete: false,
    });

    let snapshot = reader.snapshot().unwrap();
    assert_eq!(snapshot.frame_number, 8, "Reader should recover in place");
    assert_eq!(snapshot.detections.len(), 1);
}

/// Test that attach rejects a segment smaller than the detection layout
#[test]
fn test_attach_rejects_undersized_segment() {
    let dir = tempdir().unwrap();
    let key = key_for(dir.path(), "undersized", 4);

    // Create a half-size segment behind the reader's back.
    let shmid = unsafe { libc::shmget(key.raw(), 512, 0o666 | libc::IPC_CREAT) };
    assert_ne!(shmid, -1, "Raw shmget should succeed");

    let result = SegmentReader::attach(key);

    unsafe { libc::shmctl(shmid, libc::IPC_RMID, std::ptr::null_mut()) };

    match result {
        Err(SegmentError::SizeMismatch { actual, expected }) => {
            assert_eq!(actual, 512);
            assert_eq!(expected, SEGMENT_SIZE);
        }
        Err(other) => panic!("Expected SizeMismatch, got {:?}", other),
        Ok(_) => panic!("Attach should reject an undersized segment"),
    }
}

/// Test concurrent producer-consumer through the segment
///
/// Simulates the real pipeline: the detector process publishing frames while
/// the viewer polls. Handles hold raw mappings and are not Send, so each
/// thread builds its own from the shared key.
///
/// Tests:
/// - Consumer can attach while the producer is already running
/// - Frame numbers observed are monotonically non-decreasing
/// - The completion flag eventually reaches the consumer
#[test]
fn test_concurrent_producer_consumer() {
    let dir = tempdir().unwrap();
    let token = dir.path().join("concurrent");
    fs::write(&token, b"token").unwrap();

    const NUM_FRAMES: i32 = 30;

    let token_producer = token.clone();
    let token_consumer = token.clone();

    let producer = thread::spawn(move || {
        let key = SegmentKey::derive(&token_producer, 5).unwrap();
        let mut writer = SegmentWriter::create(key).unwrap();

        // Give the consumer time to attach.
        thread::sleep(Duration::from_millis(50));

        for frame in 1..=NUM_FRAMES {
            writer.publish(&DetectionSnapshot {
                frame_number: frame,
                detections: (0..(frame % 5)).map(sample_box).collect(),
                processing_complete: false,
            });
            thread::sleep(Duration::from_millis(5));
        }

        writer.mark_complete();
        // Hold the segment long enough for the consumer to see the flag.
        thread::sleep(Duration::from_millis(500));
        NUM_FRAMES
    });

    let consumer = thread::spawn(move || {
        let key = SegmentKey::derive(&token_consumer, 5).unwrap();

        // The producer may not have created the segment yet.
        let start = std::time::Instant::now();
        let reader = SegmentReader::attach_with_retry(
            key,
            Duration::from_millis(2),
            Duration::from_secs(5),
        )
        .expect("Consumer should attach once the producer creates the segment");

        let mut last_frame = 0;
        let mut frames_seen = 0u32;
        loop {
            assert!(
                start.elapsed() < Duration::from_secs(10),
                "Consumer timeout: saw {} frames, last {}",
                frames_seen,
                last_frame
            );

            let snapshot = match reader.snapshot() {
                Ok(snapshot) => snapshot,
                // A torn count can slip through when the producer is mid-write.
                Err(SegmentError::CorruptCount(_)) => continue,
                Err(other) => panic!("Unexpected read error: {}", other),
            };

            assert!(
                snapshot.frame_number >= last_frame,
                "Frame numbers must not go backwards: {} after {}",
                snapshot.frame_number,
                last_frame
            );
            if snapshot.frame_number > last_frame {
                last_frame = snapshot.frame_number;
                frames_seen += 1;
            }

            if snapshot.processing_complete {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }

        (last_frame, frames_seen)
    });

    let produced = producer.join().expect("Producer thread panicked");
    let (last_frame, frames_seen) = consumer.join().expect("Consumer thread panicked");

    assert_eq!(produced, NUM_FRAMES);
    assert_eq!(
        last_frame, NUM_FRAMES,
        "Consumer should observe the final frame before the flag"
    );
    assert!(
        frames_seen > 0,
        "Consumer should observe at least one frame update"
    );
}
