//! Yarn config files.
//!
//! The config is a list of `key: value` lines written by the procedural yarn
//! generator. Only the three keys the mapping needs are read; the generator's
//! other keys (ply and fiber counts, distribution parameters, ...) are ignored.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::error::{FabricError, FabricResult};
use crate::geom::{TileError, TileParams};

const YARN_RADIUS: &str = "yarn_radius:";
const Z_STEP_SIZE: &str = "z_step_size:";
const Z_STEP_NUM: &str = "z_step_num:";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{origin}: missing required key `{key}`")]
    MissingKey { key: &'static str, origin: String },
    #[error("{origin}: key `{key}` has no value")]
    MissingValue { key: &'static str, origin: String },
    #[error("{origin}: invalid value `{value}` for `{key}`")]
    InvalidValue {
        key: &'static str,
        value: String,
        origin: String,
    },
    #[error("{origin}: `{key}` must be {expected}, got {value}")]
    OutOfRange {
        key: &'static str,
        value: f64,
        expected: &'static str,
        origin: String,
    },
}

/// Procedural yarn parameters used by the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YarnConfig {
    /// Radius of the yarn model in yarn space.
    pub yarn_radius: f64,
    /// Spacing of the fiber samples along the yarn axis.
    pub z_step_size: f64,
    /// Number of z steps in one period of the pattern. Stored as a float
    /// because the generator writes it that way.
    pub z_step_num: f64,
}

impl YarnConfig {
    /// Parse config text. Later occurrences of a key win.
    ///
    /// `origin` names the config in error messages.
    pub fn parse(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let mut yarn_radius = None;
        let mut z_step_size = None;
        let mut z_step_num = None;

        for line in text.lines() {
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            let (key, slot) = match key {
                YARN_RADIUS => (YARN_RADIUS, &mut yarn_radius),
                Z_STEP_SIZE => (Z_STEP_SIZE, &mut z_step_size),
                Z_STEP_NUM => (Z_STEP_NUM, &mut z_step_num),
                _ => continue,
            };
            let raw = tokens.next().ok_or_else(|| ConfigError::MissingValue {
                key,
                origin: origin.to_owned(),
            })?;
            let value = raw.parse::<f64>().map_err(|_| ConfigError::InvalidValue {
                key,
                value: raw.to_owned(),
                origin: origin.to_owned(),
            })?;
            *slot = Some(value);
        }

        let require = |key: &'static str, value: Option<f64>| {
            value.ok_or_else(|| ConfigError::MissingKey {
                key,
                origin: origin.to_owned(),
            })
        };
        let config = Self {
            yarn_radius: require(YARN_RADIUS, yarn_radius)?,
            z_step_size: require(Z_STEP_SIZE, z_step_size)?,
            z_step_num: require(Z_STEP_NUM, z_step_num)?,
        };
        config.validate(origin)?;
        log::debug!("{origin}: {config:?}");
        Ok(config)
    }

    pub fn from_reader<R: Read>(mut reader: R, origin: &str) -> FabricResult<Self> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|err| FabricError::read(origin, err))?;
        Ok(Self::parse(&text, origin)?)
    }

    pub fn from_path(path: &Path) -> FabricResult<Self> {
        let file = File::open(path).map_err(|source| FabricError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file), &path.display().to_string())
    }

    fn validate(&self, origin: &str) -> Result<(), ConfigError> {
        let out_of_range = |key, value, expected| ConfigError::OutOfRange {
            key,
            value,
            expected,
            origin: origin.to_owned(),
        };
        if !(self.yarn_radius.is_finite() && self.yarn_radius > 0.0) {
            return Err(out_of_range(YARN_RADIUS, self.yarn_radius, "finite and > 0"));
        }
        if !(self.z_step_size.is_finite() && self.z_step_size > 0.0) {
            return Err(out_of_range(Z_STEP_SIZE, self.z_step_size, "finite and > 0"));
        }
        if !(self.z_step_num.is_finite() && self.z_step_num >= 0.0) {
            return Err(out_of_range(Z_STEP_NUM, self.z_step_num, "finite and >= 0"));
        }
        Ok(())
    }

    /// Tiling parameters of one pattern period.
    pub fn tile_params(&self) -> Result<TileParams, TileError> {
        TileParams::new(self.z_step_size, self.z_step_num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATOR_CONFIG: &str = "\
ply_num: 2
fiber_num: 64
z_step_size: 0.01
z_step_num: 200
yarn_radius: 0.045
yarn_clock_wise: 0
fiber_clock_wise: 1
";

    #[test]
    fn reads_known_keys_and_ignores_the_rest() {
        let config = YarnConfig::parse(GENERATOR_CONFIG, "yarn.txt").unwrap();
        assert_eq!(
            config,
            YarnConfig {
                yarn_radius: 0.045,
                z_step_size: 0.01,
                z_step_num: 200.0,
            }
        );
    }

    #[test]
    fn later_keys_override_earlier_ones() {
        let text = format!("{GENERATOR_CONFIG}yarn_radius: 0.5\n");
        let config = YarnConfig::parse(&text, "yarn.txt").unwrap();
        assert_eq!(config.yarn_radius, 0.5);
    }

    #[test]
    fn missing_key_is_reported_with_origin() {
        let err = YarnConfig::parse("yarn_radius: 1\nz_step_size: 0.1\n", "cfg.txt").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "z_step_num:", .. }));
        assert_eq!(err.to_string(), "cfg.txt: missing required key `z_step_num:`");
    }

    #[test]
    fn key_without_colon_does_not_count() {
        let err = YarnConfig::parse("yarn_radius 1\nz_step_size: 1\nz_step_num: 1\n", "c")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "yarn_radius:", .. }));
    }

    #[test]
    fn unparseable_or_empty_values_fail() {
        let err = YarnConfig::parse("yarn_radius: thick\n", "c").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "yarn_radius:", .. }));

        let err = YarnConfig::parse("z_step_num:\n", "c").unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue { key: "z_step_num:", .. }));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = YarnConfig::parse("yarn_radius: 0\nz_step_size: 1\nz_step_num: 1\n", "c")
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "yarn_radius:", .. }));

        let err = YarnConfig::parse("yarn_radius: 1\nz_step_size: 1\nz_step_num: -2\n", "c")
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { key: "z_step_num:", .. }));
    }

    #[test]
    fn tile_params_follow_config() {
        let config = YarnConfig::parse(GENERATOR_CONFIG, "yarn.txt").unwrap();
        let params = config.tile_params().unwrap();
        assert!((params.period() - 2.0).abs() < 1e-12);
        assert!((params.offset() - 1.0).abs() < 1e-12);
    }
}
