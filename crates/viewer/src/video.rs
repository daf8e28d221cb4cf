use anyhow::{Result, bail};
use opencv::core::{Mat, Size};
use opencv::highgui;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture, VideoWriter};

pub struct VideoSource {
    cap: VideoCapture,
    width: i32,
    height: i32,
    fps: f64,
}

impl VideoSource {
    pub fn open(path: &str) -> Result<Self> {
        let cap = VideoCapture::from_file(path, videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            bail!("cannot open video file {path}");
        }

        let fps = cap.get(videoio::CAP_PROP_FPS)?;
        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;

        Ok(Self {
            cap,
            width,
            height,
            fps,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Returns `None` once the stream is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.cap.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}

/// Annotated output video. The encoder is finalized on drop, so the
/// file is playable even when the run ends early.
pub struct VideoSink {
    writer: VideoWriter,
    path: String,
}

impl VideoSink {
    pub fn create(path: &str, fps: f64, width: i32, height: i32) -> Result<Self> {
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let writer = VideoWriter::new(path, fourcc, fps, Size::new(width, height), true)?;
        if !writer.is_opened()? {
            bail!("cannot create output video {path}");
        }

        Ok(Self {
            writer,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn write(&mut self, frame: &Mat) -> Result<()> {
        self.writer.write(frame)?;
        Ok(())
    }
}

impl Drop for VideoSink {
    fn drop(&mut self) {
        match self.writer.release() {
            Ok(()) => tracing::info!(path = %self.path, "Output video finalized"),
            Err(error) => {
                tracing::warn!(path = %self.path, error = %error, "Failed to finalize output video");
            }
        }
    }
}

/// Live preview window, torn down on drop.
pub struct PreviewWindow {
    name: &'static str,
}

impl PreviewWindow {
    pub fn open(name: &'static str) -> Result<Self> {
        highgui::named_window(name, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self { name })
    }

    pub fn show(&self, frame: &Mat) -> Result<()> {
        highgui::imshow(self.name, frame)?;
        Ok(())
    }

    /// Pumps the UI event loop once and reports whether `q` was pressed.
    pub fn quit_requested(&self) -> Result<bool> {
        Ok(highgui::wait_key(1)? == 'q' as i32)
    }
}

impl Drop for PreviewWindow {
    fn drop(&mut self) {
        if let Err(error) = highgui::destroy_all_windows() {
            tracing::warn!(error = %error, "Failed to tear down display windows");
        }
    }
}
