//! Real-time audio pipeline: pull blocks from a [`Source`], run them through
//! an effect [`Chain`], push them to a [`Consumer`].
//!
//! ```rust,ignore
//! use tunnel_engine::{Engine, EngineConfig, InputConfig, OutputConfig, StartOptions};
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.configure_input(InputConfig::file("in.wav"))?;
//! engine.configure_output(OutputConfig::file("out.wav"))?;
//! engine.add_effect("echo", &[("delay_ms", 250.0)])?;
//! engine.start(StartOptions::default())?;
//! ```

pub mod block;
pub mod config;
pub mod consumer;
pub mod devices;
pub mod dsp;
mod error;
pub mod graph;
pub mod ring;
pub mod source;

pub use block::FrameBlock;
pub use config::{DeviceSelector, EngineConfig, InputConfig, LiveInput, LiveOutput, OutputConfig};
pub use consumer::{Consumer, FileConsumer, LiveConsumer};
pub use dsp::effect::{Effect, Params};
pub use dsp::EffectKind;
pub use error::{Error, Result};
pub use graph::{Chain, EffectInfo};
pub use ring::RingBuffer;
pub use source::{FileSource, LiveSource, Source};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unconfigured,
    Configured,
    Built,
    Running,
    Stopped,
}

/// Cloneable, thread-safe way to ask a running engine to stop.
///
/// Takes effect at the next block boundary.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-run options for [`Engine::start`].
#[derive(Default)]
pub struct StartOptions<'a> {
    /// Frames per read; the engine's `block_size` when `None` or zero.
    pub frames: Option<usize>,
    /// Stop once this much wall time has passed.
    pub duration: Option<Duration>,
    /// Sees every processed block before it is written.
    pub on_chunk: Option<Box<dyn FnMut(&FrameBlock) + 'a>>,
}

impl<'a> StartOptions<'a> {
    pub fn frames(mut self, frames: usize) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn on_chunk(mut self, f: impl FnMut(&FrameBlock) + 'a) -> Self {
        self.on_chunk = Some(Box::new(f));
        self
    }
}

pub struct Engine {
    cfg: EngineConfig,
    input: Option<InputConfig>,
    output: Option<OutputConfig>,
    chain: Chain,
    source: Option<Box<dyn Source>>,
    consumer: Option<Box<dyn Consumer>>,
    state: EngineState,
    stop: Arc<AtomicBool>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            cfg,
            input: None,
            output: None,
            chain: Chain::new(),
            source: None,
            consumer: None,
            state: EngineState::Unconfigured,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_built(&self) -> bool {
        matches!(self.state, EngineState::Built | EngineState::Running)
    }

    pub fn is_running(&self) -> bool {
        self.is_built() && !self.stop.load(Ordering::SeqCst)
    }

    /* ---------- configuration ---------- */

    /// Set the input descriptor. Tears down a built pipeline.
    pub fn configure_input(&mut self, input: InputConfig) -> Result<&mut Self> {
        input.validate()?;
        self.teardown();
        tracing::debug!(?input, "input configured");
        self.input = Some(input);
        self.state = EngineState::Configured;
        Ok(self)
    }

    /// Set the output descriptor. Tears down a built pipeline.
    pub fn configure_output(&mut self, output: OutputConfig) -> Result<&mut Self> {
        output.validate()?;
        self.teardown();
        tracing::debug!(?output, "output configured");
        self.output = Some(output);
        if self.input.is_some() {
            self.state = EngineState::Configured;
        }
        Ok(self)
    }

    pub fn input_config(&self) -> Option<&InputConfig> {
        self.input.as_ref()
    }

    pub fn output_config(&self) -> Option<&OutputConfig> {
        self.output.as_ref()
    }

    /* ---------- effects ---------- */

    pub fn effect_registry(&self) -> &'static [EffectKind] {
        &EffectKind::ALL
    }

    pub fn effect_default_params(&self, name: &str) -> Result<Params> {
        Ok(name.parse::<EffectKind>()?.default_params())
    }

    /// Append a registered effect, overriding any of its defaults.
    pub fn add_effect(&mut self, name: &str, params: &[(&str, f32)]) -> Result<&mut Self> {
        let fx = name.parse::<EffectKind>()?.create_with(params)?;
        self.chain.push(fx);
        Ok(self)
    }

    pub fn add_effect_boxed(&mut self, fx: Box<dyn Effect>) -> &mut Self {
        self.chain.push(fx);
        self
    }

    /// Out-of-range indices are ignored.
    pub fn remove_effect(&mut self, index: usize) {
        self.chain.remove(index);
    }

    /// Move the effect at `old` to `new`. Out-of-range indices are ignored.
    pub fn reorder_effects(&mut self, old: usize, new: usize) {
        self.chain.move_effect(old, new);
    }

    pub fn clear_effects(&mut self) {
        self.chain.clear();
    }

    pub fn effects(&self) -> Vec<EffectInfo> {
        self.chain.snapshot()
    }

    pub fn effect_params(&self, index: usize) -> Option<Params> {
        self.chain.get(index).map(|fx| fx.params())
    }

    /// Update one parameter of the effect at `index`; a missing slot is a
    /// no-op, an unknown parameter is an error.
    pub fn set_effect_param(&mut self, index: usize, key: &str, value: f32) -> Result<()> {
        match self.chain.get_mut(index) {
            Some(fx) => fx.set_param(key, value),
            None => Ok(()),
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /* ---------- devices ---------- */

    pub fn list_input_devices() -> Result<Vec<(usize, String)>> {
        devices::list_input_devices()
    }

    pub fn list_output_devices() -> Result<Vec<(usize, String)>> {
        devices::list_output_devices()
    }

    /* ---------- build / run ---------- */

    /// Open the source and consumer described by the current configuration.
    ///
    /// Without an output descriptor, plays back live in the source's format.
    pub fn build(&mut self) -> Result<&mut Self> {
        let input = self.input.clone().ok_or(Error::NotConfigured("input"))?;
        self.teardown();

        let mut source: Box<dyn Source> = match &input {
            InputConfig::File { path } => Box::new(FileSource::open(path)?),
            InputConfig::Live(live) => Box::new(LiveSource::open(live)?),
        };
        let sr = source.sample_rate();
        let ch = source.channels();

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| OutputConfig::Live(LiveOutput::following_source(&self.cfg)));
        let consumer = match open_consumer(&output, sr, ch) {
            Ok(c) => c,
            Err(e) => {
                let _ = source.close();
                return Err(e);
            }
        };

        tracing::info!(sample_rate = sr, channels = ch, effects = self.chain.len(), "engine built");
        self.install(source, consumer);
        Ok(self)
    }

    /// Use caller-supplied endpoints instead of the configured ones.
    pub fn build_with(&mut self, source: Box<dyn Source>, consumer: Box<dyn Consumer>) -> &mut Self {
        self.teardown();
        self.install(source, consumer);
        self
    }

    fn install(&mut self, source: Box<dyn Source>, consumer: Box<dyn Consumer>) {
        self.chain.reset();
        self.source = Some(source);
        self.consumer = Some(consumer);
        self.state = EngineState::Built;
    }

    /// Run the pull -> process -> push loop on the calling thread.
    ///
    /// Builds first if needed. Returns when the source runs dry, the duration
    /// elapses, [`Engine::stop`] is observed, or an error occurs. The source and
    /// consumer are closed in every case.
    pub fn start(&mut self, mut opts: StartOptions<'_>) -> Result<()> {
        // cleared before building so a stop during device setup is kept
        self.stop.store(false, Ordering::SeqCst);
        if self.state != EngineState::Built {
            self.build()?;
        }
        let (Some(source), Some(consumer)) = (self.source.take(), self.consumer.take()) else {
            return Err(Error::NotConfigured("source and consumer"));
        };

        let frames = opts.frames.filter(|&n| n > 0).unwrap_or(self.cfg.block_size);
        self.state = EngineState::Running;
        tracing::info!(frames, duration = ?opts.duration, "engine started");

        let mut session = Session { source, consumer, state: &mut self.state, closed: false };
        let started = Instant::now();
        let result = run_loop(&mut session, &mut self.chain, &self.stop, frames, &mut opts);
        let closed = session.close();
        drop(session);

        tracing::info!(elapsed = ?started.elapsed(), ok = result.is_ok(), "engine stopped");
        match (result, closed) {
            (Err(e), Err(close_err)) => {
                tracing::warn!(err = %close_err, "close failed after run error");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(stats), closed) => {
                tracing::debug!(blocks = stats.blocks, frames = stats.frames, "run totals");
                closed
            }
        }
    }

    /// Ask a running loop to finish after the current block. Safe at any time.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.stop))
    }

    /// Close any open endpoints; a built pipeline goes back to Configured.
    fn teardown(&mut self) {
        if let Some(mut s) = self.source.take() {
            if let Err(e) = s.close() {
                tracing::warn!(err = %e, "closing source");
            }
        }
        if let Some(mut c) = self.consumer.take() {
            if let Err(e) = c.close() {
                tracing::warn!(err = %e, "closing consumer");
            }
        }
        if self.state == EngineState::Built {
            self.state = EngineState::Configured;
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn open_consumer(output: &OutputConfig, sr: u32, ch: u16) -> Result<Box<dyn Consumer>> {
    Ok(match output {
        OutputConfig::File { path, sample_rate, channels } => Box::new(FileConsumer::create(
            path,
            sample_rate.unwrap_or(sr),
            channels.unwrap_or(ch),
        )?),
        OutputConfig::Live(live) => Box::new(LiveConsumer::open(
            live,
            live.sample_rate.unwrap_or(sr),
            live.channels.unwrap_or(ch),
        )?),
    })
}

/* ---------- run loop ---------- */

/// Endpoints owned by one `start()` call; closed on every exit path,
/// unwinding included.
struct Session<'a> {
    source: Box<dyn Source>,
    consumer: Box<dyn Consumer>,
    state: &'a mut EngineState,
    closed: bool,
}

impl Session<'_> {
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let src = self.source.close();
        let dst = self.consumer.close();
        *self.state = EngineState::Stopped;
        src.and(dst)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(err = %e, "closing pipeline");
        }
    }
}

struct RunStats {
    blocks: u64,
    frames: u64,
}

fn run_loop(
    session: &mut Session<'_>,
    chain: &mut Chain,
    stop: &AtomicBool,
    frames: usize,
    opts: &mut StartOptions<'_>,
) -> Result<RunStats> {
    let sr = session.source.sample_rate();
    let ch = session.source.channels();
    let started = Instant::now();
    let mut stats = RunStats { blocks: 0, frames: 0 };

    while !stop.load(Ordering::SeqCst) {
        let block = session.source.read(frames)?;
        if block.is_empty() {
            tracing::debug!("source returned no frames");
            break;
        }
        let mut block = block.to_channels(ch)?;
        chain.process(&mut block, sr);
        if let Some(observe) = opts.on_chunk.as_mut() {
            observe(&block);
        }
        session.consumer.write(&block)?;

        stats.blocks += 1;
        stats.frames += block.frames() as u64;
        if opts.duration.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_engine_is_idle() {
        let engine = Engine::default();
        assert_eq!(engine.state(), EngineState::Unconfigured);
        assert!(!engine.is_built());
        assert!(!engine.is_running());
        engine.stop();
        assert!(!engine.is_running());
    }

    #[test]
    fn build_without_input_fails() {
        let mut engine = Engine::default();
        let err = engine.build().err().unwrap();
        assert!(matches!(err, Error::NotConfigured("input")));
        assert!(err.is_config());
    }

    #[test]
    fn start_without_input_fails() {
        let mut engine = Engine::default();
        assert!(engine.start(StartOptions::default()).unwrap_err().is_config());
        assert_eq!(engine.state(), EngineState::Unconfigured);
    }

    #[test]
    fn bad_descriptor_rejected_at_configure() {
        let mut engine = Engine::default();
        assert!(engine.configure_input(InputConfig::file("")).is_err());
        assert!(engine.input_config().is_none());
        assert_eq!(engine.state(), EngineState::Unconfigured);

        engine.configure_input(InputConfig::file("in.wav")).unwrap();
        assert_eq!(engine.state(), EngineState::Configured);
    }

    #[test]
    fn effect_editing() {
        let mut engine = Engine::default();
        engine.add_effect("Gain", &[("gain_db", -3.0)]).unwrap();
        engine.add_effect("echo", &[]).unwrap();
        assert!(matches!(engine.add_effect("chorus", &[]), Err(Error::UnknownEffect(_))));
        assert!(engine.add_effect("echo", &[("depth", 1.0)]).is_err());

        engine.reorder_effects(1, 0);
        let names: Vec<_> = engine.effects().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["echo", "gain"]);

        engine.set_effect_param(1, "gain_db", 6.0).unwrap();
        assert_eq!(engine.effect_params(1), Some(vec![("gain_db", 6.0)]));
        assert!(engine.set_effect_param(0, "gain_db", 1.0).is_err());
        engine.set_effect_param(9, "gain_db", 1.0).unwrap();

        engine.remove_effect(9);
        engine.remove_effect(0);
        assert_eq!(engine.chain().len(), 1);
        engine.clear_effects();
        assert!(engine.effects().is_empty());
    }

    #[test]
    fn registry_lookup() {
        let engine = Engine::default();
        assert_eq!(engine.effect_registry().len(), 5);
        assert_eq!(
            engine.effect_default_params("tremolo").unwrap(),
            vec![("rate_hz", 5.0), ("depth", 0.7)]
        );
        assert!(engine.effect_default_params("nope").is_err());
    }

    #[test]
    fn start_clears_stop_request_before_building() {
        let mut engine = Engine::default();
        let handle = engine.stop_handle();
        handle.stop();
        assert!(engine.start(StartOptions::default()).is_err());
        assert!(!handle.is_stop_requested());
    }

    #[test]
    fn stop_handle_shares_flag() {
        let engine = Engine::default();
        let handle = engine.stop_handle();
        assert!(!handle.is_stop_requested());
        handle.stop();
        assert!(handle.is_stop_requested());
    }
}
