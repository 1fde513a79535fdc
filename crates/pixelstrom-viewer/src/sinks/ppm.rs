//! Binary PPM (P6) file sink.
//!
//! The frame is written to `<path>.tmp` and renamed over `path`, so a reader
//! polling the file never sees a half-written image. Writes are throttled to
//! one per `min_interval`. A frame that arrives inside the interval is kept
//! and written by the next due `present` or `flush`, or by `reset`.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use pixelstrom_core::sink::DisplaySink;
use tracing::{debug, warn};

struct PendingFrame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

pub struct PpmSink {
    path: PathBuf,
    min_interval: Duration,
    last_write: Option<Instant>,
    pending: Option<PendingFrame>,
    writes: u64,
}

impl PpmSink {
    pub fn new(path: PathBuf, min_interval: Duration) -> Self {
        Self {
            path,
            min_interval,
            last_write: None,
            pending: None,
            writes: 0,
        }
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Whether a throttled frame is waiting to be written.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    fn due(&self, now: Instant) -> bool {
        match self.last_write {
            None => true,
            Some(t) => now.duration_since(t) >= self.min_interval,
        }
    }

    fn write_frame(&self, width: u32, height: u32, pixels: &[u8]) -> io::Result<()> {
        let mut tmp_name = self.path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let mut out = Vec::with_capacity(32 + pixels.len() / 4 * 3);
        write!(out, "P6\n{width} {height}\n255\n")?;
        for px in pixels.chunks_exact(4) {
            out.extend_from_slice(&px[..3]);
        }

        fs::write(&tmp, &out)?;
        fs::rename(&tmp, &self.path)
    }

    fn write_now(&mut self, width: u32, height: u32, pixels: &[u8], now: Instant) {
        match self.write_frame(width, height, pixels) {
            Ok(()) => {
                self.writes += 1;
                self.last_write = Some(now);
                debug!(path = %self.path.display(), width, height, "ppm frame written");
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ppm write failed");
            }
        }
    }

    fn write_pending(&mut self, now: Instant) {
        if let Some(frame) = self.pending.take() {
            self.write_now(frame.width, frame.height, &frame.pixels, now);
        }
    }
}

impl DisplaySink for PpmSink {
    fn present(&mut self, width: u32, height: u32, pixels: &[u8]) {
        let now = Instant::now();
        if self.due(now) {
            self.pending = None;
            self.write_now(width, height, pixels, now);
            return;
        }
        match self.pending.as_mut() {
            Some(frame) => {
                frame.width = width;
                frame.height = height;
                frame.pixels.clear();
                frame.pixels.extend_from_slice(pixels);
            }
            None => {
                self.pending = Some(PendingFrame {
                    width,
                    height,
                    pixels: pixels.to_vec(),
                });
            }
        }
    }

    fn flush(&mut self) {
        let now = Instant::now();
        if self.pending.is_some() && self.due(now) {
            self.write_pending(now);
        }
    }

    fn reset(&mut self) {
        // the last committed frame goes out before the buffer is released
        self.write_pending(Instant::now());
        self.last_write = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_pixel(path: &std::path::Path) -> Vec<u8> {
        let data = fs::read(path).unwrap();
        data[data.len() - 3..].to_vec()
    }

    #[test]
    fn writes_p6_without_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.ppm");
        let mut sink = PpmSink::new(path.clone(), Duration::ZERO);

        sink.present(2, 1, &[255, 0, 0, 255, 0, 0, 255, 255]);

        let data = fs::read(&path).unwrap();
        let header = b"P6\n2 1\n255\n";
        assert_eq!(&data[..header.len()], header);
        assert_eq!(&data[header.len()..], &[255, 0, 0, 0, 0, 255]);
        assert!(!dir.path().join("frame.ppm.tmp").exists());
    }

    #[test]
    fn throttled_frame_is_flushed_once_due() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.ppm");
        let mut sink = PpmSink::new(path.clone(), Duration::from_millis(200));

        sink.present(1, 1, &[1, 1, 1, 255]);
        sink.present(1, 1, &[2, 2, 2, 255]);
        assert_eq!(sink.writes(), 1);
        assert!(sink.has_pending());

        // not due yet
        sink.flush();
        assert_eq!(last_pixel(&path), vec![1, 1, 1]);

        std::thread::sleep(Duration::from_millis(400));
        sink.flush();
        assert_eq!(sink.writes(), 2);
        assert!(!sink.has_pending());
        assert_eq!(last_pixel(&path), vec![2, 2, 2]);
    }

    #[test]
    fn throttled_frames_coalesce_to_the_latest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.ppm");
        let mut sink = PpmSink::new(path.clone(), Duration::from_secs(3600));

        sink.present(1, 1, &[1, 2, 3, 255]);
        sink.present(1, 1, &[4, 4, 4, 255]);
        sink.present(2, 1, &[9, 9, 9, 255, 8, 8, 8, 255]);
        assert_eq!(sink.writes(), 1);
        assert_eq!(last_pixel(&path), vec![1, 2, 3]);

        sink.reset();
        assert_eq!(sink.writes(), 2);
        let data = fs::read(&path).unwrap();
        assert!(data.starts_with(b"P6\n2 1\n255\n"));
        assert_eq!(last_pixel(&path), vec![8, 8, 8]);

        // after a reset the next frame is written immediately
        sink.present(1, 1, &[5, 5, 5, 255]);
        assert_eq!(sink.writes(), 3);
    }

    #[test]
    fn io_error_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("frame.ppm");
        let mut sink = PpmSink::new(path, Duration::ZERO);

        sink.present(1, 1, &[0, 0, 0, 255]);
        assert_eq!(sink.writes(), 0);
    }
}
