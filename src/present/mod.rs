//! Presentation module
//!
//! Presenter adapter over the SDL display surface.

mod sdl;

pub use sdl::*;
