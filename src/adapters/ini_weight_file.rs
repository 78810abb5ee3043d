//! Weight vector persisted as a `[weights]` INI section.

use std::path::PathBuf;

use configparser::ini::Ini;

use crate::domain::error::TurbotraderError;
use crate::domain::weights::WeightVector;
use crate::ports::weight_repository_port::WeightRepository;

const SECTION: &str = "weights";
const KEYS: [&str; 4] = ["price", "volume", "rsi", "volatility"];

pub struct IniWeightFile {
    path: PathBuf,
}

impl IniWeightFile {
    pub fn new(path: PathBuf) -> Self {
        IniWeightFile { path }
    }
}

impl WeightRepository for IniWeightFile {
    fn load(&self) -> Result<Option<WeightVector>, TurbotraderError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut ini = Ini::new();
        ini.load(&self.path)
            .map_err(|reason| TurbotraderError::ConfigParse {
                file: self.path.display().to_string(),
                reason,
            })?;

        let mut values = [0.0; 4];
        for (slot, key) in values.iter_mut().zip(KEYS) {
            *slot = ini
                .getfloat(SECTION, key)
                .map_err(|reason| TurbotraderError::config_invalid(SECTION, key, reason))?
                .ok_or_else(|| TurbotraderError::ConfigMissing {
                    section: SECTION.to_string(),
                    key: key.to_string(),
                })?;
        }
        let weights = WeightVector::from_array(values);
        weights.validate()?;
        Ok(Some(weights))
    }

    fn save(&self, weights: &WeightVector) -> Result<(), TurbotraderError> {
        weights.validate()?;
        let mut ini = Ini::new();
        for (key, value) in KEYS.iter().zip(weights.as_array()) {
            ini.set(SECTION, key, Some(value.to_string()));
        }
        ini.write(&self.path)?;
        tracing::debug!(path = %self.path.display(), weights = %weights, "weights saved");
        Ok(())
    }
}
