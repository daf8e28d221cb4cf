use crate::config::ViewerConfig;
use crate::overlay;
use crate::sync::{FrameAlignment, FrameSynchronizer};
use crate::video::{PreviewWindow, VideoSink, VideoSource};
use anyhow::{Context, Result};
use segment::{SegmentKey, SegmentReader};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const WINDOW_NAME: &str = "Person Detection";

pub struct ViewerService {
    synchronizer: FrameSynchronizer<SegmentReader>,
    source: VideoSource,
    sink: VideoSink,
    display: Option<PreviewWindow>,
    shutdown: Arc<AtomicBool>,
}

impl ViewerService {
    pub fn new(config: ViewerConfig, video_path: &str, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let key = SegmentKey::derive(&config.shm_token_path, config.shm_project_id)
            .context("Failed to derive the shared memory key - the token file must exist")?;

        let reader = SegmentReader::attach(key)
            .context("Cannot connect to shared memory - make sure the detector is running first")?;
        tracing::info!(shmid = reader.shmid(), "Connected to shared memory");

        let source = VideoSource::open(video_path)
            .with_context(|| format!("Cannot open video file {video_path}"))?;
        tracing::info!(
            width = source.width(),
            height = source.height(),
            fps = source.fps(),
            "Video stream opened"
        );

        let sink = VideoSink::create(
            &config.output_path,
            source.fps(),
            source.width(),
            source.height(),
        )
        .with_context(|| format!("Cannot create output video {}", config.output_path))?;

        let display = if config.display {
            Some(PreviewWindow::open(WINDOW_NAME).context("Cannot open the display window")?)
        } else {
            None
        };

        let synchronizer = FrameSynchronizer::new(reader, config.sync_config());

        Ok(Self {
            synchronizer,
            source,
            sink,
            display,
            shutdown,
        })
    }

    pub fn run(mut self) -> Result<()> {
        tracing::info!("Waiting for detection data");
        if self.display.is_some() {
            tracing::info!("Press 'q' in the preview window to quit");
        }

        let mut frames_seen = 0u64;
        let mut frames_rendered = 0u64;
        let mut frames_missed = 0u64;

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!("Shutdown signal received");
                break;
            }

            let Some(mut frame) = self.source.next_frame()? else {
                tracing::info!("Video stream ended");
                break;
            };
            frames_seen += 1;

            match self.synchronizer.align_next_frame() {
                FrameAlignment::Matched(snapshot) => {
                    // A failed draw costs this frame its overlays, not the run.
                    if let Err(error) = overlay::draw_overlays(&mut frame, &snapshot) {
                        tracing::warn!(
                            frame = snapshot.frame_number,
                            error = %error,
                            "Overlay drawing failed, writing the frame bare"
                        );
                        frames_missed += 1;
                    } else {
                        frames_rendered += 1;
                    }
                }
                FrameAlignment::Missed(reason) => {
                    tracing::debug!(
                        frame = self.synchronizer.current_frame(),
                        reason = ?reason,
                        "No overlay for this frame"
                    );
                    frames_missed += 1;
                }
            }

            // Every consumed frame reaches the output, matched or not.
            self.sink.write(&frame)?;

            if let Some(display) = &self.display {
                display.show(&frame)?;
                if display.quit_requested()? {
                    tracing::info!("Stopped by operator");
                    break;
                }
            }

            if frames_seen.is_multiple_of(30) {
                tracing::debug!(
                    frames_seen,
                    frames_rendered,
                    frames_missed,
                    current_frame = self.synchronizer.current_frame(),
                    "Viewer status"
                );
            }

            if self.synchronizer.completion_reached() {
                tracing::info!("Detection processing complete");
                break;
            }
        }

        tracing::info!(
            total_frames = frames_seen,
            frames_rendered,
            frames_missed,
            output = self.sink.path(),
            "Visualization complete"
        );

        Ok(())
    }
}
