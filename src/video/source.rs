//! FFmpeg frame source
//!
//! Thin adapter over FFmpeg demux + decode. One compressed unit is pulled
//! per call; the decoded picture lands in a single scratch frame slot that
//! FFmpeg reuses on the next pull, which is why `next_frame` only ever
//! hands out a borrow.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use ffmpeg_next as ffmpeg;
use ffmpeg::format::input;
use ffmpeg::format::Pixel;
use ffmpeg::media::Type;
use ffmpeg::util::frame::video::Video as VideoFrame;

use crate::job::{FrameSource, SourceError};

/// Frame source that decodes the first video stream of a media file.
pub struct FfmpegSource {
    /// FFmpeg format context
    input: ffmpeg::format::context::Input,
    /// Tracked video stream index; units from other streams are skipped
    stream_index: usize,
    /// Video decoder
    decoder: ffmpeg::codec::decoder::Video,
    /// Scratch frame slot, refilled on each successful pull
    frame: VideoFrame,
    /// Input exhausted; draining the decoder's flush queue
    flushing: bool,
}

impl FfmpegSource {
    /// Open a media file and set up a decoder for its best video stream.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("video file not found: {}", path.display());
        }

        // Safe to call multiple times
        ffmpeg::init().context("failed to initialize FFmpeg")?;

        let input = input(&path).context("failed to open video file")?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| anyhow::anyhow!("no video stream found in file"))?;
        let stream_index = stream.index();

        let rate = stream.rate();
        let fps = if rate.1 != 0 {
            rate.0 as f64 / rate.1 as f64
        } else {
            0.0
        };

        let decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("failed to create decoder context")?;
        let decoder = decoder_ctx
            .decoder()
            .video()
            .context("failed to create video decoder")?;

        info!(
            "opened video: {}x{} @ {:.1}fps, format: {:?}",
            decoder.width(),
            decoder.height(),
            fps,
            decoder.format()
        );

        Ok(Self {
            input,
            stream_index,
            decoder,
            frame: VideoFrame::empty(),
            flushing: false,
        })
    }

    /// Width of the decoded pictures.
    pub fn width(&self) -> u32 {
        self.decoder.width()
    }

    /// Height of the decoded pictures.
    pub fn height(&self) -> u32 {
        self.decoder.height()
    }

    /// Native pixel format of the decoded pictures.
    pub fn format(&self) -> Pixel {
        self.decoder.format()
    }

    /// Pull one compressed unit and report whether the scratch slot now
    /// holds a complete picture.
    fn pull_step(&mut self) -> Result<bool, SourceError> {
        // Pictures already queued inside the decoder from an earlier unit
        if self.decoder.receive_frame(&mut self.frame).is_ok() {
            return Ok(true);
        }

        if self.flushing {
            return if self.decoder.receive_frame(&mut self.frame).is_ok() {
                Ok(true)
            } else {
                Err(SourceError::EndOfStream)
            };
        }

        match self.input.packets().next() {
            Some((stream, packet)) => {
                if stream.index() != self.stream_index {
                    return Ok(false);
                }
                self.decoder
                    .send_packet(&packet)
                    .map_err(|e| SourceError::DecodeFailure(e.to_string()))?;
                // Decoders may need several units per picture
                Ok(self.decoder.receive_frame(&mut self.frame).is_ok())
            }
            None => {
                // Input exhausted; flush the decoder and drain what remains
                self.flushing = true;
                let _ = self.decoder.send_eof();
                if self.decoder.receive_frame(&mut self.frame).is_ok() {
                    Ok(true)
                } else {
                    Err(SourceError::EndOfStream)
                }
            }
        }
    }
}

impl FrameSource for FfmpegSource {
    type Frame = VideoFrame;

    fn next_frame(&mut self) -> Result<Option<&VideoFrame>, SourceError> {
        if self.pull_step()? {
            Ok(Some(&self.frame))
        } else {
            Ok(None)
        }
    }
}
