//! Display sink implementations selected by `display.sink`.

pub mod log;
pub mod ppm;

use std::time::Duration;

use pixelstrom_core::sink::DisplaySink;

use crate::config::{DisplaySection, SinkKind};

pub use self::log::LogSink;
pub use self::ppm::PpmSink;

pub fn build(display: &DisplaySection) -> Box<dyn DisplaySink + Send> {
    match display.sink {
        SinkKind::Log => Box::new(LogSink::default()),
        SinkKind::Ppm => Box::new(PpmSink::new(
            display.ppm_path.clone(),
            Duration::from_millis(display.min_interval_ms),
        )),
    }
}
