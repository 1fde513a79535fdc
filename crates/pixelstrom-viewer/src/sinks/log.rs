use pixelstrom_core::framebuffer::Rect;
use pixelstrom_core::sink::DisplaySink;
use tracing::{debug, info};

/// Logs every presented frame. Useful headless.
#[derive(Debug, Default)]
pub struct LogSink {
    presents: u64,
    last_damage: Option<Rect>,
}

impl LogSink {
    pub fn presents(&self) -> u64 {
        self.presents
    }

    /// Region of the last delta present, `None` after a full-frame present.
    pub fn last_damage(&self) -> Option<Rect> {
        self.last_damage
    }
}

impl DisplaySink for LogSink {
    fn present(&mut self, width: u32, height: u32, pixels: &[u8]) {
        self.presents += 1;
        self.last_damage = None;
        debug!(width, height, bytes = pixels.len(), presents = self.presents, "frame presented");
    }

    fn present_region(&mut self, width: u32, height: u32, _pixels: &[u8], damage: Rect) {
        self.presents += 1;
        self.last_damage = Some(damage);
        debug!(
            width,
            height,
            damage_x = damage.x,
            damage_y = damage.y,
            damage_width = damage.width,
            damage_height = damage.height,
            presents = self.presents,
            "frame region presented"
        );
    }

    fn reset(&mut self) {
        self.last_damage = None;
        info!(presents = self.presents, "display reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_presents_across_resets() {
        let mut sink = LogSink::default();
        sink.present(1, 1, &[0, 0, 0, 255]);
        sink.reset();
        sink.present(1, 1, &[0, 0, 0, 255]);
        assert_eq!(sink.presents(), 2);
    }

    #[test]
    fn region_present_keeps_damage() {
        let damage = Rect {
            x: 1,
            y: 0,
            width: 2,
            height: 1,
        };
        let mut sink = LogSink::default();
        sink.present_region(3, 1, &[0; 12], damage);
        assert_eq!(sink.last_damage(), Some(damage));
        assert_eq!(sink.presents(), 1);

        sink.present(3, 1, &[0; 12]);
        assert_eq!(sink.last_damage(), None);
    }
}
