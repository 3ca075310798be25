//! Registers a `"default"` encoder for the log configuration.
//!
//! It's a [`PatternEncoder`] with the pattern used by every appender here,
//! optionally prefixed with the time.

use log4rs::config::{Deserialize, Deserializers};
use log4rs::encode::Encode;
use log4rs::encode::pattern::PatternEncoder;

pub fn deserializers() -> Deserializers {
    let mut d = Deserializers::default();
    d.insert("default", PatternDeserializer);
    d
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct PatternConfig {
    #[serde(default)]
    time: bool,
}

pub struct PatternDeserializer;

impl Deserialize for PatternDeserializer {
    type Trait = dyn Encode;
    type Config = PatternConfig;

    fn deserialize(
        &self,
        config: Self::Config,
        _: &Deserializers,
    ) -> anyhow::Result<Box<Self::Trait>> {
        let pattern = if config.time {
            "[{d(%H:%M:%S%.3f)} {h({l:<5})} {t}] {m}{n}"
        } else {
            "[{h({l:<5})} {t}] {m}{n}"
        };

        Ok(Box::new(PatternEncoder::new(pattern)))
    }
}
