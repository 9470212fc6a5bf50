//! Headless playback controller.
//!
//! Owns a [`Module`] and manages a background playback thread over the
//! speaker sink, plus offline rendering into raw PCM or WAV bytes. This is
//! the seam a UI or CLI front-end attaches to: it only ever sees this
//! crate's surface and the state-update receiver.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver};
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{error, info};
use rp_audio::{CpalSink, StreamSink, WavSink};
use rp_engine::{AudioSink, Player, RenderOptions, StateUpdate};
use rp_ir::Module;

// Re-export the types front-ends need so they don't reach into the
// engine crates directly.
pub use rp_engine::PlayError;
pub use rp_ir::ModuleKind;

/// Bound on buffered row updates; laggy consumers lose events, the render
/// loop never blocks on them.
const STATE_CHANNEL_DEPTH: usize = 64;

/// Owns a module and drives playback sessions over it.
pub struct Controller {
    module: Option<Arc<Module>>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    cancel: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new() -> Self {
        Self { module: None, playback: None }
    }

    /// Replace the loaded module, stopping any running playback.
    pub fn set_module(&mut self, module: Module) {
        self.stop();
        self.module = Some(Arc::new(module));
    }

    pub fn module(&self) -> Option<&Module> {
        self.module.as_deref()
    }

    /// Start speaker playback on a background thread.
    ///
    /// Returns the row-position feed for the session. Device failures
    /// surface as a finished session (and an error log), not a panic.
    pub fn play(&mut self) -> Option<Receiver<StateUpdate>> {
        let module = self.module.clone()?;
        self.stop();

        let cancel = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (tx, rx) = sync_channel(STATE_CHANNEL_DEPTH);

        let thread_cancel = cancel.clone();
        let thread_finished = finished.clone();
        let thread = std::thread::spawn(move || {
            let mut sink = match CpalSink::new() {
                Ok(sink) => sink,
                Err(err) => {
                    error!("audio device unavailable: {err}");
                    thread_finished.store(true, Ordering::Relaxed);
                    return;
                }
            };

            let options = RenderOptions {
                sample_rate: sink.sample_rate(),
                ..RenderOptions::default()
            };
            let mut player = Player::new(&module, options).with_state_updates(tx);
            if let Err(err) = player.render(&mut sink, &thread_cancel) {
                error!("playback aborted: {err}");
            }
            thread_finished.store(true, Ordering::Relaxed);
        });

        info!("playback started");
        self.playback = Some(PlaybackHandle {
            cancel,
            finished,
            thread: Some(thread),
        });
        Some(rx)
    }

    /// Cancel playback and wait for the render thread to wind down.
    pub fn stop(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.cancel.store(true, Ordering::Relaxed);
            if let Some(thread) = playback.thread.take() {
                let _ = thread.join();
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    pub fn is_finished(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.finished.load(Ordering::Relaxed))
    }

    /// Render the whole song offline into raw interleaved PCM.
    pub fn render_frames(&self, options: RenderOptions) -> Result<Vec<u8>, PlayError> {
        let Some(module) = &self.module else {
            return Ok(Vec::new());
        };
        let mut sink = StreamSink::new(Vec::new(), options.sample_rate);
        Player::new(module, options).render(&mut sink, &AtomicBool::new(false))?;
        Ok(sink.into_inner())
    }

    /// Render the whole song offline into a finished WAV file.
    pub fn render_to_wav(&self, options: RenderOptions) -> Result<Vec<u8>, PlayError> {
        let Some(module) = &self.module else {
            return Ok(Vec::new());
        };
        let mut sink = WavSink::new(
            Cursor::new(Vec::new()),
            options.sample_rate,
            options.output_channels as u16,
            options.bytes_per_sample as u16,
        );
        Player::new(module, options).render(&mut sink, &AtomicBool::new(false))?;
        Ok(sink.into_inner().into_inner())
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}
