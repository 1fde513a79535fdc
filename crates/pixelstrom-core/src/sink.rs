//! Display sink contract.
//!
//! The session calls [`DisplaySink::present`] after every successful store
//! mutation with the just-committed framebuffer. How pixels reach a screen is
//! up to the implementation.

use crate::framebuffer::Rect;

pub trait DisplaySink {
    /// `pixels` is `width * height * 4` bytes of RGBA, alpha always 255.
    fn present(&mut self, width: u32, height: u32, pixels: &[u8]);

    /// Like `present`, after a delta that only touched `damage`.
    fn present_region(&mut self, width: u32, height: u32, pixels: &[u8], damage: Rect) {
        let _ = damage;
        self.present(width, height, pixels)
    }

    /// Called periodically by the driver. Sinks that defer output write it here.
    fn flush(&mut self) {}

    /// The framebuffer was released (reconnect or shutdown).
    fn reset(&mut self) {}
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn present(&mut self, width: u32, height: u32, pixels: &[u8]) {
        (**self).present(width, height, pixels)
    }

    fn present_region(&mut self, width: u32, height: u32, pixels: &[u8], damage: Rect) {
        (**self).present_region(width, height, pixels, damage)
    }

    fn flush(&mut self) {
        (**self).flush()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

impl<S: DisplaySink + ?Sized> DisplaySink for &mut S {
    fn present(&mut self, width: u32, height: u32, pixels: &[u8]) {
        (**self).present(width, height, pixels)
    }

    fn present_region(&mut self, width: u32, height: u32, pixels: &[u8], damage: Rect) {
        (**self).present_region(width, height, pixels, damage)
    }

    fn flush(&mut self) {
        (**self).flush()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
