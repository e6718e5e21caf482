/// Splits a concatenated MJPEG byte stream into individual JPEG images.
pub struct MjpegSplitter {
    buffer: Vec<u8>,
    max_frame_bytes: usize,
}

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

impl MjpegSplitter {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(64 * 1024),
            max_frame_bytes,
        }
    }

    /// Feeds a chunk of stream bytes and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            let Some(start) = find_marker(&self.buffer, 0, SOI) else {
                // A trailing 0xFF may be the first half of the next SOI
                let keep = usize::from(self.buffer.last() == Some(&0xFF));
                let drop_len = self.buffer.len() - keep;
                self.buffer.drain(..drop_len);
                break;
            };
            if start > 0 {
                self.buffer.drain(..start);
            }

            let Some(end) = find_marker(&self.buffer, SOI.len(), EOI) else {
                if self.buffer.len() > self.max_frame_bytes {
                    log::warn!(
                        "Discarding {} bytes of unterminated MJPEG frame",
                        self.buffer.len()
                    );
                    self.buffer.clear();
                }
                break;
            };

            frames.push(self.buffer.drain(..end + EOI.len()).collect());
        }

        frames
    }
}

fn find_marker(data: &[u8], from: usize, marker: [u8; 2]) -> Option<usize> {
    data.get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|pos| pos + from)
}
