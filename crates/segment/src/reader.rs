use crate::errors::SegmentError;
use crate::key::SegmentKey;
use crate::layout::{DetectionSnapshot, SEGMENT_SIZE};
use std::io;
use std::ptr;
use std::thread;
use std::time::{Duration, Instant};

/// How many back-to-back copies to take before giving up on agreement.
///
/// The detector updates the segment with no synchronization at all, so a
/// single copy can land mid-write. Two identical consecutive copies mean the
/// copy is coherent; after this many attempts the newest copy is used as-is.
const STABLE_READ_ROUNDS: usize = 3;

/// Read-only attachment to the detector's segment.
///
/// Detaches on drop but never removes the segment; the detector owns its
/// lifetime.
pub struct SegmentReader {
    shmid: libc::c_int,
    addr: *const u8,
    segment_size: usize,
}

impl SegmentReader {
    /// Attach to an existing segment.
    ///
    /// Fails with `NotFound` if the detector has not created the segment
    /// yet, and with `SizeMismatch` if the segment is too small to hold the
    /// detection layout.
    pub fn attach(key: SegmentKey) -> Result<Self, SegmentError> {
        // SAFETY: size 0 without IPC_CREAT only looks up an existing id.
        let shmid = unsafe { libc::shmget(key.raw(), 0, 0) };
        if shmid == -1 {
            let err = io::Error::last_os_error();
            return Err(match err.raw_os_error() {
                Some(libc::ENOENT) => SegmentError::NotFound { key: key.raw() },
                _ => SegmentError::AttachFailed(err),
            });
        }

        // SAFETY: stat is a valid shmid_ds; IPC_STAT only writes into it.
        let mut stat: libc::shmid_ds = unsafe { std::mem::zeroed() };
        if unsafe { libc::shmctl(shmid, libc::IPC_STAT, &mut stat) } == -1 {
            return Err(SegmentError::AttachFailed(io::Error::last_os_error()));
        }
        let segment_size = stat.shm_segsz as usize;
        if segment_size < SEGMENT_SIZE {
            return Err(SegmentError::SizeMismatch {
                actual: segment_size,
                expected: SEGMENT_SIZE,
            });
        }

        // SAFETY: shmid was validated above; SHM_RDONLY maps it read-only at
        // a kernel-chosen address.
        let addr = unsafe { libc::shmat(shmid, ptr::null(), libc::SHM_RDONLY) };
        if addr as isize == -1 {
            return Err(SegmentError::AttachFailed(io::Error::last_os_error()));
        }

        tracing::debug!(shmid, segment_size, "attached to detection segment");

        Ok(Self {
            shmid,
            addr: addr as *const u8,
            segment_size,
        })
    }

    /// Attach, polling while the segment does not exist yet.
    ///
    /// Lets the consumer start before the detector. Errors other than
    /// `NotFound` abort immediately; once `timeout` elapses the wait ends
    /// with `Timeout`.
    pub fn attach_with_retry(
        key: SegmentKey,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Self, SegmentError> {
        let started = Instant::now();
        loop {
            match Self::attach(key) {
                Err(SegmentError::NotFound { .. }) if started.elapsed() < timeout => {
                    thread::sleep(poll_interval);
                }
                Err(SegmentError::NotFound { .. }) => return Err(SegmentError::Timeout(timeout)),
                other => return other,
            }
        }
    }

    pub fn shmid(&self) -> libc::c_int {
        self.shmid
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Copy the full detection layout out of the segment.
    pub fn read_raw(&self) -> [u8; SEGMENT_SIZE] {
        let mut buf = [0u8; SEGMENT_SIZE];
        // SAFETY: attach() verified the mapping holds at least SEGMENT_SIZE
        // bytes, and addr stays mapped until Drop detaches it.
        unsafe { ptr::copy_nonoverlapping(self.addr, buf.as_mut_ptr(), SEGMENT_SIZE) };
        buf
    }

    /// Copy and decode the segment, re-reading until two consecutive copies
    /// match byte for byte. Falls back to the newest copy if the detector
    /// keeps writing through every round.
    pub fn snapshot(&self) -> Result<DetectionSnapshot, SegmentError> {
        let mut current = self.read_raw();
        for _ in 1..STABLE_READ_ROUNDS {
            let next = self.read_raw();
            if next == current {
                return DetectionSnapshot::decode(&current);
            }
            current = next;
        }

        tracing::trace!(
            rounds = STABLE_READ_ROUNDS,
            "segment changed on every read, decoding newest copy"
        );
        DetectionSnapshot::decode(&current)
    }
}

impl Drop for SegmentReader {
    fn drop(&mut self) {
        // SAFETY: addr came from a successful shmat and is detached exactly once.
        unsafe { libc::shmdt(self.addr as *const libc::c_void) };
    }
}
