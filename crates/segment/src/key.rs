use crate::errors::SegmentError;
use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// Token path and project id the detector feeds to ftok(3).
pub const DETECTOR_TOKEN_PATH: &str = "detector.cpp";
pub const DETECTOR_PROJECT_ID: libc::c_int = 65;

/// A System V IPC key, derived the same way the detector derives it.
///
/// ftok(3) hashes the token file's inode and device together with the
/// project id, so both sides must name the same existing file and the same
/// id to land on the same segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentKey(libc::key_t);

impl SegmentKey {
    pub fn derive(token: impl AsRef<Path>, project_id: libc::c_int) -> Result<Self, SegmentError> {
        let token = token.as_ref();
        let c_path = CString::new(token.as_os_str().as_bytes()).map_err(|_| {
            SegmentError::KeyDerivation {
                token: token.display().to_string(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "token path contains NUL"),
            }
        })?;

        // SAFETY: c_path is a valid NUL-terminated path for the duration of the call.
        let key = unsafe { libc::ftok(c_path.as_ptr(), project_id) };
        if key == -1 {
            return Err(SegmentError::KeyDerivation {
                token: token.display().to_string(),
                source: io::Error::last_os_error(),
            });
        }

        Ok(Self(key))
    }

    /// Key for the detector's default token, resolved against the current
    /// working directory like the detector does.
    pub fn detector_default() -> Result<Self, SegmentError> {
        Self::derive(DETECTOR_TOKEN_PATH, DETECTOR_PROJECT_ID)
    }

    pub fn raw(&self) -> libc::key_t {
        self.0
    }
}
