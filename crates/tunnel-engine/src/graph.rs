use crate::block::FrameBlock;
use crate::dsp::effect::{Effect, Params};

/// Name and current parameters of one chain slot.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectInfo {
    pub name: &'static str,
    pub params: Params,
}

/// A serial chain of effects. Owns the effects.
///
/// Index-based edits with an out-of-range index do nothing.
#[derive(Default)]
pub struct Chain {
    effects: Vec<Box<dyn Effect>>,
}

impl Chain {
    pub fn new() -> Self {
        Self { effects: Vec::new() }
    }
    pub fn push(&mut self, fx: Box<dyn Effect>) {
        tracing::debug!(effect = fx.name(), slot = self.effects.len(), "chain: push");
        self.effects.push(fx);
    }
    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Effect>> {
        if index >= self.effects.len() {
            return None;
        }
        let fx = self.effects.remove(index);
        tracing::debug!(effect = fx.name(), slot = index, "chain: remove");
        Some(fx)
    }
    /// Take the effect at `from` out and reinsert it at `to`.
    pub fn move_effect(&mut self, from: usize, to: usize) {
        let len = self.effects.len();
        if from >= len || to >= len {
            return;
        }
        let fx = self.effects.remove(from);
        self.effects.insert(to, fx);
        tracing::debug!(from, to, "chain: move");
    }
    pub fn clear(&mut self) {
        self.effects.clear();
    }
    pub fn len(&self) -> usize {
        self.effects.len()
    }
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
    pub fn get(&self, index: usize) -> Option<&dyn Effect> {
        self.effects.get(index).map(|fx| fx.as_ref())
    }
    pub fn get_mut(&mut self, index: usize) -> Option<&mut (dyn Effect + 'static)> {
        self.effects.get_mut(index).map(|fx| fx.as_mut())
    }
    pub fn iter(&self) -> impl Iterator<Item = &dyn Effect> {
        self.effects.iter().map(|fx| fx.as_ref())
    }
    pub fn snapshot(&self) -> Vec<EffectInfo> {
        self.iter().map(|fx| EffectInfo { name: fx.name(), params: fx.params() }).collect()
    }
    /// Drop every effect's accumulated state.
    pub fn reset(&mut self) {
        for fx in self.effects.iter_mut() {
            fx.reset();
        }
    }
    /// Process one block in place, first effect first.
    pub fn process(&mut self, block: &mut FrameBlock, sample_rate: u32) {
        for fx in self.effects.iter_mut() {
            fx.process(block, sample_rate);
        }
    }
}
