//! Canonical framebuffer store.
//!
//! The store owns at most one framebuffer. Snapshots replace it wholesale,
//! paint batches patch it in place, and readers only ever get an immutable
//! [`FrameView`]. The pixel buffer length equals `width * height * 4` at every
//! point a caller can observe; a rejected snapshot leaves the previous
//! framebuffer untouched.
//!
//! Alpha is forced to 255 on every write. The server packs colors as
//! `r | g << 8 | b << 16` and leaves the alpha byte zero, so the transmitted
//! alpha carries no meaning for display.

use crate::error::{Result, ViewerError};
use crate::protocol::envelope::Snapshot;
use crate::protocol::paint::PaintRecord;

const OPAQUE: u8 = 255;

/// Number of pixel bytes for `width x height` RGBA, or `None` on overflow.
pub fn byte_len(width: u32, height: u32) -> Option<usize> {
    let w = usize::try_from(width).ok()?;
    let h = usize::try_from(height).ok()?;
    w.checked_mul(h)?.checked_mul(4)
}

#[derive(Debug)]
struct Framebuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

/// Borrowed, read-only view of the current framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView<'a> {
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

impl FrameView<'_> {
    /// RGBA of one pixel, `None` when out of range.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = pixel_offset(self.width, x, y)?;
        let px = self.pixels.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Axis-aligned region, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    fn point(x: u32, y: u32) -> Self {
        Self {
            x,
            y,
            width: 1,
            height: 1,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        let right = (self.x + self.width).max(x + 1);
        let bottom = (self.y + self.height).max(y + 1);
        self.x = self.x.min(x);
        self.y = self.y.min(y);
        self.width = right - self.x;
        self.height = bottom - self.y;
    }
}

/// Outcome of [`FramebufferStore::apply_paint_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaintReport {
    /// Records written to the framebuffer.
    pub applied: usize,
    /// Records skipped (out of range, or no framebuffer yet).
    pub dropped: usize,
    /// Bounding box of the applied records.
    pub damage: Option<Rect>,
}

/// Owner of the single current framebuffer.
#[derive(Debug, Default)]
pub struct FramebufferStore {
    current: Option<Framebuffer>,
}

impl FramebufferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a snapshot has been applied since creation or the last reset.
    pub fn is_seeded(&self) -> bool {
        self.current.is_some()
    }

    /// Replace the framebuffer with `snapshot`.
    ///
    /// On error the previous framebuffer (if any) is retained unchanged.
    pub fn replace(&mut self, snapshot: &Snapshot) -> Result<()> {
        let (width, height) = (snapshot.width, snapshot.height);
        if width == 0 || height == 0 {
            return Err(ViewerError::InvalidDimensions { width, height });
        }
        if byte_len(width, height) != Some(snapshot.pixels.len()) {
            return Err(ViewerError::PixelLengthMismatch {
                width,
                height,
                actual: snapshot.pixels.len(),
            });
        }

        let mut pixels = snapshot.pixels.to_vec();
        for px in pixels.chunks_exact_mut(4) {
            px[3] = OPAQUE;
        }

        self.current = Some(Framebuffer {
            width,
            height,
            pixels,
        });
        Ok(())
    }

    /// Apply records in order. Out-of-range records are skipped and counted;
    /// they never invalidate the rest of the batch.
    pub fn apply_paint_batch<I>(&mut self, records: I) -> PaintReport
    where
        I: IntoIterator<Item = PaintRecord>,
    {
        let mut report = PaintReport::default();
        let Some(fb) = self.current.as_mut() else {
            report.dropped = records.into_iter().count();
            return report;
        };

        for r in records {
            let (x, y) = (u32::from(r.x), u32::from(r.y));
            if x >= fb.width || y >= fb.height {
                report.dropped += 1;
                continue;
            }
            let slot = match pixel_offset(fb.width, x, y) {
                Some(o) => fb.pixels.get_mut(o..o + 4),
                None => None,
            };
            let Some(px) = slot else {
                report.dropped += 1;
                continue;
            };
            px[..3].copy_from_slice(&r.rgba[..3]);
            px[3] = OPAQUE;

            report.applied += 1;
            match report.damage.as_mut() {
                Some(rect) => rect.include(x, y),
                None => report.damage = Some(Rect::point(x, y)),
            }
        }
        report
    }

    /// Read-only view for display. `None` before the first snapshot.
    pub fn current_view(&self) -> Option<FrameView<'_>> {
        self.current.as_ref().map(|fb| FrameView {
            width: fb.width,
            height: fb.height,
            pixels: &fb.pixels,
        })
    }

    /// Owned copy of the current state.
    pub fn to_snapshot(&self) -> Option<Snapshot> {
        self.current
            .as_ref()
            .map(|fb| Snapshot::new(fb.width, fb.height, fb.pixels.clone()))
    }

    /// Release the framebuffer (teardown or reconnect).
    pub fn reset(&mut self) {
        self.current = None;
    }
}

fn pixel_offset(width: u32, x: u32, y: u32) -> Option<usize> {
    let idx = u64::from(y) * u64::from(width) + u64::from(x);
    usize::try_from(idx).ok()?.checked_mul(4)
}
