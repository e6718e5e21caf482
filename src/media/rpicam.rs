use image::{ImageFormat, RgbImage};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::time::{sleep, Duration, Instant};

use super::mjpeg::MjpegSplitter;
use super::{MediaAccessError, MediaTrack, VideoSource, VideoStream};
use crate::config::CameraConfig;

const RPICAM_VID: &str = "rpicam-vid";
const STDERR_TAIL_LINES: usize = 20;
const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Check if rpicam-vid command is available
pub fn is_installed() -> bool {
    match Command::new(RPICAM_VID).arg("--version").output() {
        Ok(output) => {
            debug!("rpicam-vid version: {}", String::from_utf8_lossy(&output.stdout).trim());
            true
        }
        Err(e) => {
            debug!("rpicam-vid not available: {}", e);
            false
        }
    }
}

/// Raspberry Pi camera streamed as MJPEG from rpicam-vid's stdout
pub struct RpicamSource {
    width: u32,
    height: u32,
    framerate: u32,
    startup_timeout: Duration,
}

impl RpicamSource {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            framerate: config.framerate,
            startup_timeout: Duration::from_millis(config.startup_timeout_ms),
        }
    }

    fn args(&self) -> Vec<String> {
        vec![
            "-t".to_string(),
            "0".to_string(), // Run until killed
            "--width".to_string(),
            self.width.to_string(),
            "--height".to_string(),
            self.height.to_string(),
            "--framerate".to_string(),
            self.framerate.to_string(),
            "--codec".to_string(),
            "mjpeg".to_string(),
            "--nopreview".to_string(),
            "--flush".to_string(),
            "--verbose".to_string(),
            "0".to_string(),
            "-o".to_string(),
            "-".to_string(),
        ]
    }
}

#[async_trait::async_trait]
impl VideoSource for RpicamSource {
    fn name(&self) -> &'static str {
        "rpicam"
    }

    async fn request_video_stream(&self) -> Result<Box<dyn VideoStream>, MediaAccessError> {
        let args = self.args();
        info!(
            "Starting {}: {}x{} @ {}fps",
            RPICAM_VID, self.width, self.height, self.framerate
        );
        debug!("{} args: {:?}", RPICAM_VID, args);

        let mut child = Command::new(RPICAM_VID)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    MediaAccessError::NoDevice(format!("{} is not installed", RPICAM_VID))
                }
                std::io::ErrorKind::PermissionDenied => {
                    MediaAccessError::PermissionDenied(e.to_string())
                }
                _ => MediaAccessError::Unavailable(format!("failed to spawn {}: {}", RPICAM_VID, e)),
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(MediaAccessError::Unavailable(format!(
                "could not attach to {} output",
                RPICAM_VID
            )));
        };

        let track = MediaTrack::new(RPICAM_VID);
        let latest = Arc::new(Mutex::new(None));
        let stderr_tail = Arc::new(Mutex::new(VecDeque::new()));

        {
            let track = track.clone();
            let latest = Arc::clone(&latest);
            thread::spawn(move || read_mjpeg_stream(stdout, latest, track));
        }
        {
            let tail = Arc::clone(&stderr_tail);
            thread::spawn(move || drain_stderr(stderr, tail));
        }

        let mut stream = RpicamStream {
            child: Some(child),
            track,
            latest,
        };

        // Wait until the camera delivers a frame or the process gives up
        let deadline = Instant::now() + self.startup_timeout;
        loop {
            if stream.has_frame() {
                info!("{} streaming", RPICAM_VID);
                return Ok(Box::new(stream));
            }

            if let Some(status) = stream.exit_status() {
                let tail = stderr_tail
                    .lock()
                    .map(|lines| lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n"))
                    .unwrap_or_default();
                error!("{} exited with {}: {}", RPICAM_VID, status, tail);
                stream.stop();
                return Err(classify_failure(&tail));
            }

            if Instant::now() >= deadline {
                stream.stop();
                return Err(MediaAccessError::Unavailable(format!(
                    "no frame from {} within {} ms",
                    RPICAM_VID,
                    self.startup_timeout.as_millis()
                )));
            }

            sleep(Duration::from_millis(50)).await;
        }
    }
}

pub struct RpicamStream {
    child: Option<Child>,
    track: MediaTrack,
    latest: Arc<Mutex<Option<Vec<u8>>>>,
}

impl RpicamStream {
    fn has_frame(&self) -> bool {
        self.latest.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn exit_status(&mut self) -> Option<std::process::ExitStatus> {
        self.child.as_mut().and_then(|child| child.try_wait().ok().flatten())
    }
}

impl VideoStream for RpicamStream {
    fn tracks(&self) -> Vec<MediaTrack> {
        vec![self.track.clone()]
    }

    fn latest_frame(&self) -> Option<RgbImage> {
        // The last JPEG outlives the process; never serve it once the camera is gone
        if !self.track.is_live() {
            return None;
        }
        let jpeg = self.latest.lock().ok()?.clone()?;
        match image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg) {
            Ok(img) => Some(img.to_rgb8()),
            Err(e) => {
                debug!("Skipping undecodable MJPEG frame: {}", e);
                None
            }
        }
    }

    fn stop(&mut self) {
        self.track.stop();
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            info!("{} stopped", RPICAM_VID);
        }
    }
}

impl Drop for RpicamStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keeps only the most recent complete JPEG from the stream
fn read_mjpeg_stream<R: Read>(mut reader: R, latest: Arc<Mutex<Option<Vec<u8>>>>, track: MediaTrack) {
    let mut splitter = MjpegSplitter::new(MAX_FRAME_BYTES);
    let mut buf = vec![0u8; 64 * 1024];
    let mut frame_count = 0u64;

    while track.is_live() {
        match reader.read(&mut buf) {
            Ok(0) => {
                info!("Camera stream ended (EOF)");
                break;
            }
            Ok(n) => {
                for frame in splitter.push(&buf[..n]) {
                    frame_count += 1;
                    if let Ok(mut slot) = latest.lock() {
                        *slot = Some(frame);
                    }
                }
                if frame_count > 0 && frame_count % 300 == 0 {
                    debug!("Camera stream: {} frames", frame_count);
                }
            }
            Err(e) => {
                error!("Error reading camera stream: {}", e);
                break;
            }
        }
    }

    track.stop();
    info!("Camera reader finished after {} frames", frame_count);
}

fn drain_stderr<R: Read>(reader: R, tail: Arc<Mutex<VecDeque<String>>>) {
    for line in BufReader::new(reader).lines().map_while(Result::ok) {
        if let Ok(mut lines) = tail.lock() {
            if lines.len() == STDERR_TAIL_LINES {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }
}

/// Maps rpicam's diagnostic output to the access error it describes
pub fn classify_failure(stderr: &str) -> MediaAccessError {
    let lower = stderr.to_lowercase();
    let detail = stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("camera process exited")
        .trim()
        .to_string();

    if lower.contains("no cameras available") || lower.contains("no such device") {
        MediaAccessError::NoDevice(detail)
    } else if lower.contains("permission denied") || lower.contains("operation not permitted") {
        MediaAccessError::PermissionDenied(detail)
    } else {
        warn!("Unrecognised camera failure: {}", detail);
        MediaAccessError::Unavailable(detail)
    }
}
