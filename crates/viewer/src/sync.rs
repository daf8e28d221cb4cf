use segment::{DetectionSnapshot, SegmentError, SegmentReader};
use std::thread;
use std::time::{Duration, Instant};

/// Anything that can produce a coherent detection snapshot on demand.
pub trait SnapshotSource {
    fn snapshot(&mut self) -> Result<DetectionSnapshot, SegmentError>;
}

impl SnapshotSource for SegmentReader {
    fn snapshot(&mut self) -> Result<DetectionSnapshot, SegmentError> {
        SegmentReader::snapshot(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    WaitingForMatch,
    Aligned,
    DrainingComplete,
    Terminated,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    pub wait_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            wait_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of aligning one video frame against the detector's output.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameAlignment {
    /// The detector has results for exactly this frame.
    Matched(DetectionSnapshot),
    /// No results for this frame; it should be shown without overlays.
    Missed(MissReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    /// The detector already moved past this frame.
    ProducerAhead,
    /// The detector finished before reaching this frame.
    ProducerFinished,
    /// The detector never caught up within the wait bound.
    TimedOut,
    /// The snapshot could not be decoded this round.
    ReadFailed,
    /// Synchronization already terminated.
    Halted,
}

/// Keeps the video stream in lockstep with the detector.
///
/// Both sides walk the same file, so frame numbers match one to one.
/// The detector publishes its latest result into shared memory and the
/// synchronizer polls that single slot: when the published frame number
/// is behind the frame we are about to show, we wait; when it jumped
/// past us, we skip the overlay rather than stall the stream. Once the
/// detector raises its completion flag and we have caught up to its
/// final frame, the synchronizer terminates and never reads the
/// segment again.
pub struct FrameSynchronizer<S> {
    source: S,
    config: SyncConfig,
    state: SyncState,
    current_frame: i32,
}

impl<S: SnapshotSource> FrameSynchronizer<S> {
    pub fn new(source: S, config: SyncConfig) -> Self {
        Self {
            source,
            config,
            state: SyncState::WaitingForMatch,
            current_frame: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Frame number of the most recently aligned video frame.
    pub fn current_frame(&self) -> i32 {
        self.current_frame
    }

    /// Advances to the next video frame and resolves its overlay status.
    ///
    /// Read errors are reported as a miss and leave the state untouched,
    /// so one torn snapshot costs one overlay, not the whole stream.
    pub fn align_next_frame(&mut self) -> FrameAlignment {
        if self.state == SyncState::Terminated {
            return FrameAlignment::Missed(MissReason::Halted);
        }

        self.current_frame += 1;
        let wait_started = Instant::now();

        let snapshot = loop {
            let snapshot = match self.source.snapshot() {
                Ok(snapshot) => snapshot,
                Err(error) => {
                    tracing::warn!(
                        frame = self.current_frame,
                        error = %error,
                        "segment read failed, showing this frame without overlays"
                    );
                    return FrameAlignment::Missed(MissReason::ReadFailed);
                }
            };

            if snapshot.frame_number >= self.current_frame || snapshot.processing_complete {
                break snapshot;
            }

            if wait_started.elapsed() >= self.config.wait_timeout {
                self.state = SyncState::WaitingForMatch;
                tracing::warn!(
                    frame = self.current_frame,
                    detector_frame = snapshot.frame_number,
                    timeout_ms = self.config.wait_timeout.as_millis() as u64,
                    "gave up waiting for the detector to reach this frame"
                );
                return FrameAlignment::Missed(MissReason::TimedOut);
            }

            thread::sleep(self.config.poll_interval);
        };

        if snapshot.frame_number == self.current_frame {
            self.state = SyncState::Aligned;
            return FrameAlignment::Matched(snapshot);
        }

        if snapshot.processing_complete {
            self.state = SyncState::DrainingComplete;
            let reason = if snapshot.frame_number > self.current_frame {
                MissReason::ProducerAhead
            } else {
                MissReason::ProducerFinished
            };
            return FrameAlignment::Missed(reason);
        }

        self.state = SyncState::WaitingForMatch;
        FrameAlignment::Missed(MissReason::ProducerAhead)
    }

    /// Checks whether the detector is done and we have shown its final
    /// frame. Returns `true` exactly once the stream should stop; after
    /// that the shared segment is never touched again.
    pub fn completion_reached(&mut self) -> bool {
        if self.state == SyncState::Terminated {
            return true;
        }

        let snapshot = match self.source.snapshot() {
            Ok(snapshot) => snapshot,
            Err(error) => {
                tracing::warn!(error = %error, "segment read failed during completion check");
                return false;
            }
        };

        if snapshot.processing_complete && self.current_frame >= snapshot.frame_number {
            tracing::info!(
                frame = self.current_frame,
                "detector reported completion, halting synchronization"
            );
            self.state = SyncState::Terminated;
            return true;
        }

        false
    }
}
