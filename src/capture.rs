use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, ImageError, RgbImage};
use thiserror::Error;

use crate::media::CaptureSession;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No active camera stream")]
    NoActiveStream,
    #[error("Camera has not delivered a frame yet")]
    NoFrame,
    #[error("Failed to encode frame as JPEG: {0}")]
    Encode(#[from] ImageError),
}

/// A still frame encoded as JPEG, ready to be submitted once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Snapshots the session's current frame at its native resolution.
pub fn capture(session: &CaptureSession, quality: u8) -> Result<CapturedImage, CaptureError> {
    if !session.is_active() {
        return Err(CaptureError::NoActiveStream);
    }

    let frame = session.current_frame().ok_or(CaptureError::NoFrame)?;
    let image = encode_jpeg(&frame, quality)?;
    log::info!(
        "Captured frame {}x{} ({} bytes)",
        image.width,
        image.height,
        image.jpeg.len()
    );
    Ok(image)
}

pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<CapturedImage, CaptureError> {
    let (width, height) = frame.dimensions();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode(
        frame.as_raw(),
        width,
        height,
        ColorType::Rgb8,
    )?;

    Ok(CapturedImage { jpeg, width, height })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::test_pattern::TestPatternSource;
    use crate::media::{MediaTrack, VideoStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingStream {
        track: MediaTrack,
        reads: Arc<AtomicUsize>,
    }

    impl VideoStream for CountingStream {
        fn tracks(&self) -> Vec<MediaTrack> {
            vec![self.track.clone()]
        }

        fn latest_frame(&self) -> Option<RgbImage> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            None
        }

        fn stop(&mut self) {
            self.track.stop();
        }
    }

    #[test]
    fn test_capture_without_stream_fails() {
        let session = CaptureSession::new();
        assert!(matches!(
            capture(&session, 90),
            Err(CaptureError::NoActiveStream)
        ));
    }

    #[test]
    fn test_closed_session_never_reads_frame() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut session = CaptureSession::new();
        session.bind(Box::new(CountingStream {
            track: MediaTrack::new("counting"),
            reads: Arc::clone(&reads),
        }));
        session.close();

        assert!(matches!(
            capture(&session, 90),
            Err(CaptureError::NoActiveStream)
        ));
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_active_stream_without_frame() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut session = CaptureSession::new();
        session.bind(Box::new(CountingStream {
            track: MediaTrack::new("counting"),
            reads: Arc::clone(&reads),
        }));

        assert!(matches!(capture(&session, 90), Err(CaptureError::NoFrame)));
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_capture_uses_native_resolution() {
        let mut session = CaptureSession::new();
        session.open(&TestPatternSource::new(320, 180)).await.unwrap();

        let captured = capture(&session, 85).unwrap();
        assert_eq!((captured.width, captured.height), (320, 180));
        assert_eq!(&captured.jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&captured.jpeg).unwrap();
        assert_eq!(decoded.to_rgb8().dimensions(), (320, 180));
    }
}
