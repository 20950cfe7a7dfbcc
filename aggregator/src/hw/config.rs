// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::Error;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A default element width, in bits.
pub const ELEMENT_WIDTH: usize = 8;

/// A default number of banks.
pub const BANK_COUNT: usize = 4;

/// A default per-bank depth.
pub const BANK_DEPTH: usize = 16;

/// How a producer write issued while the aggregator reports full is handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum ViolationPolicy {
    /// Drop the write and keep going, as the hardware does.
    Ignore,
    /// Fail the step with `Error::WriteWhileFull`, leaving all state untouched.
    Reject,
}

impl Default for ViolationPolicy {
    fn default() -> Self {
        Self::Ignore
    }
}

/// Structural parameters of an aggregator; fixed once it is built.
///
/// constructed programmatically or read from a config file.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct AggregatorConfig {
    /// width of a producer element, in bits
    pub element_width: usize,
    pub bank_count: usize,
    /// elements per bank; must be a power of two
    pub bank_depth: usize,
    #[serde(default)]
    pub violation_policy: ViolationPolicy,
}

impl AggregatorConfig {
    pub fn new(element_width: usize, bank_count: usize, bank_depth: usize) -> Self {
        Self {
            element_width,
            bank_count,
            bank_depth,
            violation_policy: ViolationPolicy::default(),
        }
    }

    pub fn with_violation_policy(mut self, violation_policy: ViolationPolicy) -> Self {
        self.violation_policy = violation_policy;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.element_width == 0 {
            return Err(Error::InvalidConfiguration(
                "element width must be at least one bit".to_string(),
            ));
        }
        if self.bank_count == 0 {
            return Err(Error::InvalidConfiguration(
                "at least one bank is required".to_string(),
            ));
        }
        if !self.bank_depth.is_power_of_two() {
            return Err(Error::InvalidConfiguration(format!(
                "bank depth {} is not a power of two",
                self.bank_depth
            )));
        }
        Ok(())
    }

    /// Width of the assembled output word, in bits.
    pub fn word_width(&self) -> usize {
        self.element_width * self.bank_count
    }

    /// Number of bits needed to address a bank's memory.
    pub fn address_width(&self) -> usize {
        self.bank_depth.trailing_zeros() as usize
    }

    /// Width of the bank pointers: the address plus the wrap bit.
    pub fn pointer_width(&self) -> usize {
        self.address_width() + 1
    }

    pub fn from_file(file_name: &Path) -> anyhow::Result<Self> {
        let file = File::open(file_name)
            .with_context(|| format!("Failed to open config file {}", file_name.display()))?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader)
            .with_context(|| format!("Failed to parse config file {}", file_name.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_str(config: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(config).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self::new(ELEMENT_WIDTH, BANK_COUNT, BANK_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_yaml_config() {
        let conf_str = "---
element_width: 12
bank_count: 6
bank_depth: 32
violation_policy: Reject
";
        let config = AggregatorConfig::from_str(&conf_str).unwrap();
        assert_eq!(config.element_width, 12);
        assert_eq!(config.bank_count, 6);
        assert_eq!(config.bank_depth, 32);
        assert_eq!(config.violation_policy, ViolationPolicy::Reject);
        assert_eq!(config.word_width(), 72);
        assert_eq!(config.address_width(), 5);
        assert_eq!(config.pointer_width(), 6);
    }

    #[test]
    fn violation_policy_defaults_to_ignore() {
        let config = AggregatorConfig::from_str("element_width: 8\nbank_count: 4\nbank_depth: 2\n")
            .unwrap();
        assert_eq!(config.violation_policy, ViolationPolicy::Ignore);
        assert_eq!(config.address_width(), 1);
    }

    #[test]
    fn write_yaml_config() {
        let config = AggregatorConfig::default().with_violation_policy(ViolationPolicy::Reject);
        let yaml = config.to_yaml().unwrap();
        println!("{}", yaml);
        assert_eq!(AggregatorConfig::from_str(&yaml).unwrap(), config);
    }

    #[test]
    fn reject_invalid_parameters() {
        assert!(AggregatorConfig::new(0, 4, 2).validate().is_err());
        assert!(AggregatorConfig::new(8, 0, 2).validate().is_err());
        assert!(matches!(
            AggregatorConfig::new(8, 4, 6).validate(),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(AggregatorConfig::new(8, 4, 0).validate().is_err());
        assert!(AggregatorConfig::new(1, 1, 1).validate().is_ok());
        assert!(AggregatorConfig::from_str("element_width: 8\nbank_count: 4\nbank_depth: 3\n").is_err());
    }
}
