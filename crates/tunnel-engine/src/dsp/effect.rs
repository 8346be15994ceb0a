use crate::block::FrameBlock;
use crate::Result;

/// Named parameter values, in declaration order.
pub type Params = Vec<(&'static str, f32)>;

/// Stateful block transform.
/// - `process()` works in place and keeps its recurrence state (delay lines,
///   phase) between calls, so consecutive blocks behave like one long block.
/// - Internal buffers are sized lazily from the sample rate and channel count
///   of the block and rebuilt (silent) when either changes.
/// - Parameters are clamped on every call; out-of-range values never reach
///   the recurrences.
/// - An empty block is left untouched.
pub trait Effect: Send {
    fn name(&self) -> &'static str;
    fn process(&mut self, block: &mut FrameBlock, sample_rate: u32);
    fn params(&self) -> Params;
    fn set_param(&mut self, key: &str, value: f32) -> Result<()>;
    /// Forget accumulated state.
    fn reset(&mut self) {}
}
