use crate::errors::SegmentError;
use crate::key::SegmentKey;
use crate::layout::{COMPLETE_OFFSET, DetectionSnapshot, SEGMENT_SIZE};
use std::io;
use std::ptr;

/// Stand-in for the detector, used by the integration tests.
///
/// Creates the segment, zeroes it the way the detector does on startup, and
/// removes it again on drop so test runs never leak IPC ids.
pub struct SegmentWriter {
    shmid: libc::c_int,
    addr: *mut u8,
}

impl SegmentWriter {
    pub fn create(key: SegmentKey) -> Result<Self, SegmentError> {
        // SAFETY: creates (or opens) a segment of exactly SEGMENT_SIZE bytes
        // with the same 0666 mode the detector uses.
        let shmid = unsafe { libc::shmget(key.raw(), SEGMENT_SIZE, 0o666 | libc::IPC_CREAT) };
        if shmid == -1 {
            return Err(SegmentError::AttachFailed(io::Error::last_os_error()));
        }

        // SAFETY: shmid refers to the segment created or opened above.
        let addr = unsafe { libc::shmat(shmid, ptr::null(), 0) };
        if addr as isize == -1 {
            return Err(SegmentError::AttachFailed(io::Error::last_os_error()));
        }
        let addr = addr as *mut u8;

        // SAFETY: the mapping is SEGMENT_SIZE bytes and writable.
        unsafe { ptr::write_bytes(addr, 0, SEGMENT_SIZE) };

        Ok(Self { shmid, addr })
    }

    pub fn shmid(&self) -> libc::c_int {
        self.shmid
    }

    /// Encode and publish a full snapshot, clamping excess boxes the way the
    /// detector clamps its own output.
    pub fn publish(&mut self, snapshot: &DetectionSnapshot) {
        self.publish_raw(&snapshot.encode());
    }

    /// Overwrite the whole segment with a raw image. Lets tests place
    /// arbitrary bytes, including deliberately torn or corrupt states.
    pub fn publish_raw(&mut self, bytes: &[u8; SEGMENT_SIZE]) {
        // SAFETY: both buffers are exactly SEGMENT_SIZE bytes and the
        // mapping stays valid until Drop.
        unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), self.addr, SEGMENT_SIZE) };
    }

    /// Set the completion flag without touching anything else, mirroring the
    /// detector's final store before it exits.
    pub fn mark_complete(&mut self) {
        // SAFETY: COMPLETE_OFFSET is inside the mapping.
        unsafe { *self.addr.add(COMPLETE_OFFSET) = 1 };
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        // SAFETY: detach our mapping, then ask the kernel to remove the id.
        // Removal is deferred until the last attached reader detaches too.
        unsafe {
            libc::shmdt(self.addr as *const libc::c_void);
            libc::shmctl(self.shmid, libc::IPC_RMID, ptr::null_mut());
        }
    }
}
