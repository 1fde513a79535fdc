//! pixelstrom viewer: connects to a pixelstrom server, mirrors its
//! framebuffer, and hands every committed frame to a display sink.

pub mod config;
pub mod obs;
pub mod runner;
pub mod sinks;
pub mod transport;

pub use runner::Viewer;
