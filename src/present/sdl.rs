//! SDL presenter
//!
//! Thin adapter over an SDL window: a streaming YV12 texture sized to the
//! video, a persistent swscale context that converts the decoder's native
//! pixel layout to planar YUV420, and the event pump whose quit event is
//! the early-stop trigger. All of this is created in background mode;
//! `present` only converts, uploads and blits.

use anyhow::{Context, Result};
use tracing::{debug, info};

use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{Context as Scaler, Flags};
use ffmpeg::util::frame::video::Video as VideoFrame;

use sdl2::event::{Event, WindowEvent};
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, Texture, TextureCreator};
use sdl2::video::{Window, WindowContext};

use crate::job::{PresentError, Presenter};

/// Presenter that blits decoded frames to an SDL window.
pub struct SdlPresenter {
    // SDL contexts are kept alive for the lifetime of the surface
    _sdl: sdl2::Sdl,
    events: sdl2::EventPump,
    canvas: Canvas<Window>,
    _texture_creator: TextureCreator<WindowContext>,
    texture: Texture,
    /// Conversion context from the decoder's native layout to YUV420
    scaler: Scaler,
    /// Conversion scratch frame, reused across presents
    converted: VideoFrame,
    /// Set once a quit or window-close event was seen
    quit: bool,
}

impl SdlPresenter {
    /// Create a window sized to the video and the conversion context from
    /// the source pixel format.
    pub fn new(title: &str, width: u32, height: u32, src_format: Pixel) -> Result<Self> {
        let sdl = sdl2::init().map_err(|e| anyhow::anyhow!("SDL init failed: {}", e))?;
        let video = sdl
            .video()
            .map_err(|e| anyhow::anyhow!("SDL video subsystem failed: {}", e))?;

        let window = video
            .window(title, width, height)
            .position_centered()
            .build()
            .context("failed to create window")?;

        let canvas = window
            .into_canvas()
            .build()
            .context("failed to create canvas")?;

        let texture_creator = canvas.texture_creator();
        let texture = texture_creator
            .create_texture_streaming(PixelFormatEnum::YV12, width, height)
            .context("failed to create streaming texture")?;

        let events = sdl
            .event_pump()
            .map_err(|e| anyhow::anyhow!("SDL event pump failed: {}", e))?;

        let scaler = Scaler::get(
            src_format,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            Flags::BILINEAR,
        )
        .context("failed to create conversion context")?;

        info!(width, height, ?src_format, "display surface created");

        Ok(Self {
            _sdl: sdl,
            events,
            canvas,
            _texture_creator: texture_creator,
            texture,
            scaler,
            converted: VideoFrame::empty(),
            quit: false,
        })
    }
}

impl Presenter for SdlPresenter {
    type Frame = VideoFrame;

    fn present(&mut self, frame: &VideoFrame) -> Result<(), PresentError> {
        if self.quit {
            return Err(PresentError::SurfaceLost);
        }

        self.scaler
            .run(frame, &mut self.converted)
            .map_err(|e| PresentError::Convert(e.to_string()))?;

        self.texture
            .update_yuv(
                None,
                self.converted.data(0),
                self.converted.stride(0),
                self.converted.data(1),
                self.converted.stride(1),
                self.converted.data(2),
                self.converted.stride(2),
            )
            .map_err(|e| PresentError::Blit(e.to_string()))?;

        self.canvas
            .copy(&self.texture, None, None)
            .map_err(PresentError::Blit)?;
        self.canvas.present();

        Ok(())
    }

    fn poll_quit(&mut self) -> bool {
        for event in self.events.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::Window {
                    win_event: WindowEvent::Close,
                    ..
                } => {
                    debug!("quit event received");
                    self.quit = true;
                }
                _ => {}
            }
        }
        self.quit
    }
}
