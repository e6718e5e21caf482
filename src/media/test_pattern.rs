use image::{ImageBuffer, RgbImage};
use std::time::Instant;

use super::{MediaAccessError, MediaTrack, VideoSource, VideoStream};

/// Synthetic camera used when no real device is available
pub struct TestPatternSource {
    width: u32,
    height: u32,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[async_trait::async_trait]
impl VideoSource for TestPatternSource {
    fn name(&self) -> &'static str {
        "test-pattern"
    }

    async fn request_video_stream(&self) -> Result<Box<dyn VideoStream>, MediaAccessError> {
        if self.width == 0 || self.height == 0 {
            return Err(MediaAccessError::NoDevice(format!(
                "test pattern has no pixels ({}x{})",
                self.width, self.height
            )));
        }
        log::info!("Test pattern camera started: {}x{}", self.width, self.height);
        Ok(Box::new(TestPatternStream {
            track: MediaTrack::new("test-pattern"),
            width: self.width,
            height: self.height,
            started: Instant::now(),
        }))
    }
}

pub struct TestPatternStream {
    track: MediaTrack,
    width: u32,
    height: u32,
    started: Instant,
}

impl VideoStream for TestPatternStream {
    fn tracks(&self) -> Vec<MediaTrack> {
        vec![self.track.clone()]
    }

    fn latest_frame(&self) -> Option<RgbImage> {
        if !self.track.is_live() {
            return None;
        }

        let time = self.started.elapsed().as_secs_f32();
        let (w, h) = (self.width as f32, self.height as f32);
        let img = ImageBuffer::from_fn(self.width, self.height, |x, y| {
            let r = ((x as f32 / w * 255.0) + (time * 1.5).sin() * 50.0) as u8;
            let g = ((y as f32 / h * 255.0) + (time * 0.9).cos() * 50.0) as u8;
            let b = (((x + y) as f32 / (w + h) * 255.0) + (time * 2.1).sin() * 50.0) as u8;
            image::Rgb([r.saturating_add(60), g.saturating_add(60), b.saturating_add(60)])
        });
        Some(img)
    }

    fn stop(&mut self) {
        if self.track.is_live() {
            self.track.stop();
            log::info!("Test pattern camera stopped");
        }
    }
}

impl Drop for TestPatternStream {
    fn drop(&mut self) {
        self.stop();
    }
}
