// Camera access: a VideoSource hands out live streams, a CaptureSession owns
// at most one of them and stops its tracks when closed or dropped.

use image::RgbImage;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{CameraBackend, CameraConfig};

pub mod mjpeg;
#[cfg(feature = "camera")]
pub mod rpicam;
pub mod test_pattern;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaAccessError {
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("No camera found: {0}")]
    NoDevice(String),
    #[error("Camera unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

/// One media track of a stream. Clones share the same live flag.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    label: String,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> TrackState {
        if self.live.load(Ordering::SeqCst) {
            TrackState::Live
        } else {
            TrackState::Ended
        }
    }

    pub fn is_live(&self) -> bool {
        self.state() == TrackState::Live
    }

    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

/// A live, video-only stream handed out by a [`VideoSource`].
pub trait VideoStream: Send {
    fn tracks(&self) -> Vec<MediaTrack>;

    /// Most recent complete frame at the device's native resolution.
    fn latest_frame(&self) -> Option<RgbImage>;

    /// Stops every track. Calling it again is a no-op.
    fn stop(&mut self);
}

#[async_trait::async_trait]
pub trait VideoSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn request_video_stream(&self) -> Result<Box<dyn VideoStream>, MediaAccessError>;
}

/// Exclusive owner of the stream backing the camera view.
pub struct CaptureSession {
    stream: Option<Box<dyn VideoStream>>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self { stream: None }
    }

    /// Requests a stream from `source` and binds it, replacing any stream
    /// already bound. On failure the session is left as it was.
    ///
    /// The camera view runs the same two steps split across frames: the
    /// request runs on the runtime and `bind` is applied once it completes.
    pub async fn open(&mut self, source: &dyn VideoSource) -> Result<(), MediaAccessError> {
        let stream = source.request_video_stream().await?;
        self.bind(stream);
        Ok(())
    }

    pub fn bind(&mut self, stream: Box<dyn VideoStream>) {
        self.close();
        info!("Camera stream bound ({} track(s))", stream.tracks().len());
        self.stream = Some(stream);
    }

    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            let leaked = stream.tracks().iter().filter(|t| t.is_live()).count();
            if leaked > 0 {
                warn!("{} camera track(s) still live after stop", leaked);
            }
            info!("Camera stream closed");
        }
    }

    /// True while a stream is bound and at least one of its tracks is live.
    pub fn is_active(&self) -> bool {
        self.stream
            .as_ref()
            .map_or(false, |stream| stream.tracks().iter().any(|t| t.is_live()))
    }

    /// True when a stream is bound, even if its tracks have ended.
    pub fn is_bound(&self) -> bool {
        self.stream.is_some()
    }

    pub fn current_frame(&self) -> Option<RgbImage> {
        self.stream.as_ref().and_then(|stream| stream.latest_frame())
    }

    pub fn tracks(&self) -> Vec<MediaTrack> {
        self.stream
            .as_ref()
            .map(|stream| stream.tracks())
            .unwrap_or_default()
    }
}

impl Default for CaptureSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}

// Factory function that returns the video source selected by configuration
pub fn create_source(config: &CameraConfig) -> Arc<dyn VideoSource> {
    let test_pattern = || -> Arc<dyn VideoSource> {
        Arc::new(test_pattern::TestPatternSource::new(config.width, config.height))
    };

    match config.backend {
        CameraBackend::TestPattern => test_pattern(),
        #[cfg(feature = "camera")]
        CameraBackend::Rpicam => Arc::new(rpicam::RpicamSource::new(config)),
        #[cfg(feature = "camera")]
        CameraBackend::Auto => {
            if rpicam::is_installed() {
                info!("Using rpicam-vid camera backend");
                Arc::new(rpicam::RpicamSource::new(config))
            } else {
                warn!("rpicam-vid not found, using test pattern camera");
                test_pattern()
            }
        }
        #[cfg(not(feature = "camera"))]
        CameraBackend::Rpicam | CameraBackend::Auto => {
            warn!("Built without camera support, using test pattern camera");
            test_pattern()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::test_pattern::TestPatternSource;

    struct DeniedSource;

    #[async_trait::async_trait]
    impl VideoSource for DeniedSource {
        fn name(&self) -> &'static str {
            "denied"
        }

        async fn request_video_stream(&self) -> Result<Box<dyn VideoStream>, MediaAccessError> {
            Err(MediaAccessError::PermissionDenied("user dismissed prompt".to_string()))
        }
    }

    #[tokio::test]
    async fn test_close_stops_every_track() {
        let source = TestPatternSource::new(320, 240);
        let mut session = CaptureSession::new();
        session.open(&source).await.unwrap();
        assert!(session.is_active());

        let tracks = session.tracks();
        assert!(!tracks.is_empty());
        assert!(tracks.iter().all(|t| t.is_live()));

        session.close();
        assert!(!session.is_active());
        assert!(tracks.iter().all(|t| t.state() == TrackState::Ended));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut session = CaptureSession::new();
        session.close();
        assert!(!session.is_active());

        session.open(&TestPatternSource::new(64, 48)).await.unwrap();
        session.close();
        session.close();
        assert!(!session.is_active());
        assert!(session.current_frame().is_none());
    }

    #[tokio::test]
    async fn test_drop_releases_stream() {
        let mut session = CaptureSession::new();
        session.open(&TestPatternSource::new(64, 48)).await.unwrap();
        let tracks = session.tracks();

        drop(session);
        assert!(tracks.iter().all(|t| !t.is_live()));
    }

    #[tokio::test]
    async fn test_reopen_replaces_previous_stream() {
        let source = TestPatternSource::new(64, 48);
        let mut session = CaptureSession::new();
        session.open(&source).await.unwrap();
        let first = session.tracks();

        session.open(&source).await.unwrap();
        assert!(first.iter().all(|t| !t.is_live()));
        assert!(session.tracks().iter().all(|t| t.is_live()));
    }

    #[tokio::test]
    async fn test_open_failure_reports_cause() {
        let mut session = CaptureSession::new();
        let err = session.open(&DeniedSource).await.unwrap_err();

        assert!(matches!(err, MediaAccessError::PermissionDenied(_)));
        assert!(err.to_string().contains("user dismissed prompt"));
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn test_ended_track_deactivates_session() {
        let mut session = CaptureSession::new();
        session.open(&TestPatternSource::new(64, 48)).await.unwrap();

        for track in session.tracks() {
            track.stop();
        }
        assert!(session.is_bound());
        assert!(!session.is_active());
        assert!(session.current_frame().is_none());

        session.close();
        assert!(!session.is_bound());
    }

    #[test]
    fn test_create_source_honours_backend() {
        let config = CameraConfig {
            backend: CameraBackend::TestPattern,
            ..crate::config::Config::default().camera
        };
        assert_eq!(create_source(&config).name(), "test-pattern");
    }
}
