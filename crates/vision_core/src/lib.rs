//! vision_core: frames, colour-endpoint detection and overlay drawing.

pub mod color;
pub mod interfaces;
pub mod overlay;
pub mod source;

pub mod prelude {
    pub use crate::color::*;
    pub use crate::interfaces::*;
    pub use crate::overlay::*;
    pub use crate::source::*;
}
