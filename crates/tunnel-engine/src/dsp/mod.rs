pub mod distortion;
pub mod echo;
pub mod effect;
pub mod gain;
pub mod reverb;
pub mod tremolo;

use crate::{Error, Result};
use distortion::Distortion;
use echo::Echo;
use effect::{Effect, Params};
use gain::Gain;
use reverb::Reverb;
use std::fmt;
use std::str::FromStr;
use tremolo::Tremolo;

/// The built-in effects, addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Gain,
    Distortion,
    Echo,
    Tremolo,
    Reverb,
}

impl EffectKind {
    pub const ALL: [EffectKind; 5] = [
        EffectKind::Gain,
        EffectKind::Distortion,
        EffectKind::Echo,
        EffectKind::Tremolo,
        EffectKind::Reverb,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Gain => "gain",
            EffectKind::Distortion => "distortion",
            EffectKind::Echo => "echo",
            EffectKind::Tremolo => "tremolo",
            EffectKind::Reverb => "reverb",
        }
    }

    /// New instance with default parameters.
    pub fn create(self) -> Box<dyn Effect> {
        match self {
            EffectKind::Gain => Box::new(Gain::default()),
            EffectKind::Distortion => Box::new(Distortion::default()),
            EffectKind::Echo => Box::new(Echo::default()),
            EffectKind::Tremolo => Box::new(Tremolo::default()),
            EffectKind::Reverb => Box::new(Reverb::default()),
        }
    }

    /// New instance with `params` applied over the defaults.
    pub fn create_with(self, params: &[(&str, f32)]) -> Result<Box<dyn Effect>> {
        let mut fx = self.create();
        for &(key, value) in params {
            fx.set_param(key, value)?;
        }
        Ok(fx)
    }

    pub fn default_params(self) -> Params {
        self.create().params()
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        EffectKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| Error::UnknownEffect(s.to_string()))
    }
}
