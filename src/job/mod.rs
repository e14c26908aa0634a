//! The bounded unit of work released once per period.
//!
//! `PlaybackJob` pulls at most one frame from its source and, if a frame
//! arrived, pushes it to its presenter. Everything the job touches is
//! behind the `FrameSource`/`Presenter` seams so the loop logic tests
//! against synthetic pipelines. All source and present errors collapse to
//! the [`JobOutcome`] signal the scheduler loop consumes; detail is logged,
//! never re-thrown past the loop boundary.

use thiserror::Error;
use tracing::{debug, error, info};

/// Continue/stop signal produced by each job invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Release the next job.
    Continue,
    /// The stream ended or a fatal condition occurred; stop the loop.
    Stop,
}

/// A bounded unit of work invoked once per release by the scheduler loop.
pub trait Job {
    fn run(&mut self) -> JobOutcome;
}

/// Frame acquisition failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// No more input units remain. Expected terminal condition.
    #[error("end of stream")]
    EndOfStream,

    /// Unrecoverable codec error. Fatal to the loop, not retried.
    #[error("decode failed: {0}")]
    DecodeFailure(String),
}

/// Presentation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresentError {
    /// The output surface was invalidated (window closed). Treated as
    /// equivalent to end-of-stream.
    #[error("display surface lost")]
    SurfaceLost,

    /// Pixel-format conversion failed.
    #[error("frame conversion failed: {0}")]
    Convert(String),

    /// Uploading or blitting the converted frame failed.
    #[error("blit failed: {0}")]
    Blit(String),
}

/// Pulls one compressed unit per call and yields zero or one
/// fully-reconstructed frame.
///
/// The source owns a single scratch frame slot that it refills on each
/// successful pull; the returned borrow keeps the frame alive for the
/// current job invocation only.
pub trait FrameSource {
    type Frame;

    /// `Ok(None)` when the pulled unit did not belong to the tracked
    /// stream or did not complete a picture.
    fn next_frame(&mut self) -> Result<Option<&Self::Frame>, SourceError>;
}

/// Converts one reconstructed frame to the surface layout and blits it.
pub trait Presenter {
    type Frame;

    fn present(&mut self, frame: &Self::Frame) -> Result<(), PresentError>;

    /// `true` once the display subsystem requested a quit. Consumed as an
    /// early-stop trigger at the start of each job invocation.
    fn poll_quit(&mut self) -> bool;
}

/// The periodic job body: decode-one, present-one.
///
/// Owns the long-lived pipeline handles (the source's decoding context and
/// the presenter's surface and conversion context) for the duration of the
/// real-time phase. They are acquired before `enter_real_time` and dropped
/// after `exit_real_time`; nothing in [`run`](Job::run) allocates.
pub struct PlaybackJob<S, P> {
    source: S,
    presenter: P,
    frames_presented: u64,
}

impl<S, P> PlaybackJob<S, P>
where
    S: FrameSource,
    P: Presenter<Frame = S::Frame>,
{
    pub fn new(source: S, presenter: P) -> Self {
        Self {
            source,
            presenter,
            frames_presented: 0,
        }
    }

    /// Frames pushed to the presenter so far.
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Tear the job apart to drop the pipeline handles individually.
    pub fn into_parts(self) -> (S, P) {
        (self.source, self.presenter)
    }
}

impl<S, P> Job for PlaybackJob<S, P>
where
    S: FrameSource,
    P: Presenter<Frame = S::Frame>,
{
    fn run(&mut self) -> JobOutcome {
        if self.presenter.poll_quit() {
            info!("quit requested, stopping");
            return JobOutcome::Stop;
        }

        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return JobOutcome::Continue,
            Err(SourceError::EndOfStream) => {
                info!(frames = self.frames_presented, "end of stream");
                return JobOutcome::Stop;
            }
            Err(SourceError::DecodeFailure(reason)) => {
                error!(%reason, "fatal decode error");
                return JobOutcome::Stop;
            }
        };

        match self.presenter.present(frame) {
            Ok(()) => {
                self.frames_presented += 1;
                debug!(frame = self.frames_presented, "frame presented");
                JobOutcome::Continue
            }
            Err(PresentError::SurfaceLost) => {
                info!("display surface lost, stopping");
                JobOutcome::Stop
            }
            Err(err) => {
                error!(%err, "fatal present error");
                JobOutcome::Stop
            }
        }
    }
}
