//! pixelstrom facade.
//!
//! Re-exports the core state machine and the viewer runtime so users can
//! depend on a single crate.

pub mod core {
    pub use pixelstrom_core::*;
}

pub mod viewer {
    pub use pixelstrom_viewer::*;
}
