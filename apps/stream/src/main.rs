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


//! Push random narrow elements through a round-robin aggregator and check
//! that the consumer sees every round, in order.

use std::path::PathBuf;

use anyhow::Context;
use env_logger::Target;
use structopt::StructOpt;

use aggregator::{
    simulate, Aggregator, AggregatorConfig, SimulationCallbacks, SimulationReport,
    TrafficProperties, BANK_COUNT, BANK_DEPTH, DEFAULT_SEED, ELEMENT_WIDTH,
};

#[derive(StructOpt)]
#[structopt(name = "stream", about = "A round-robin bank aggregator simulation")]
struct Arguments {
    /// YAML aggregator configuration; overrides --width, --banks and --depth
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,
    /// element width, in bits
    #[structopt(short, long, default_value = "8")]
    width: usize,
    /// number of banks
    #[structopt(short, long, default_value = "4")]
    banks: usize,
    /// elements per bank, a power of two
    #[structopt(short, long, default_value = "16")]
    depth: usize,
    #[structopt(short, long, default_value = "300")]
    cycles: usize,
    /// probability the producer has a new element in a cycle
    #[structopt(long, default_value = "1.0")]
    write_rate: f64,
    /// probability the consumer is ready in a cycle
    #[structopt(long, default_value = "0.5")]
    ready_rate: f64,
    #[structopt(long)]
    seed: Option<u64>,
    /// dump a VCD trace to this file
    #[structopt(long, parse(from_os_str))]
    vcd: Option<PathBuf>,
}

impl Arguments {
    fn aggregator_config(&self) -> anyhow::Result<AggregatorConfig> {
        match &self.config {
            Some(path) => AggregatorConfig::from_file(path),
            None => {
                let config = AggregatorConfig::new(self.width, self.banks, self.depth);
                config.validate()?;
                Ok(config)
            }
        }
    }
}

fn run(args: &Arguments) -> anyhow::Result<SimulationReport> {
    let config = args.aggregator_config()?;
    log::info!(
        "{} banks x {} elements of {} bits -> {} bit words",
        config.bank_count,
        config.bank_depth,
        config.element_width,
        config.word_width()
    );
    let mut aggregator = Aggregator::new(config)?;
    let mut traffic = TrafficProperties::seeded(
        args.write_rate,
        args.ready_rate,
        args.seed.unwrap_or(DEFAULT_SEED),
    );
    let mut callbacks = match &args.vcd {
        Some(path) => SimulationCallbacks::create_vcd_callbacks(path)?,
        None => SimulationCallbacks::default(),
    };
    let report = simulate(&mut aggregator, args.cycles, &mut traffic, &mut callbacks)?;
    report.verify().context("Delivered words do not match accepted rounds")?;
    aggregator.debug_dump_memory();
    Ok(report)
}

fn main() {
    let args = Arguments::from_args();

    let _logger = env_logger::builder()
        .filter(Some("stream"), log::LevelFilter::Info)
        .target(Target::Stderr)
        .init();

    match run(&args) {
        Ok(report) => log::info!(
            "verified {} words from {} accepted elements ({} rounds complete)",
            report.delivered.len(),
            report.accepted.len(),
            report.complete_rounds()
        ),
        Err(err) => {
            log::error!("{:?}", err);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arguments(extra: &[&str]) -> Arguments {
        let mut argv = vec!["stream"];
        argv.extend_from_slice(extra);
        Arguments::from_iter(argv)
    }

    #[test]
    fn defaults_match_library_defaults() {
        let args = arguments(&[]);
        let config = args.aggregator_config().unwrap();
        assert_eq!(config.element_width, ELEMENT_WIDTH);
        assert_eq!(config.bank_count, BANK_COUNT);
        assert_eq!(config.bank_depth, BANK_DEPTH);
    }

    #[test]
    fn run_verifies_round_trip() {
        let _logger = env_logger::builder().is_test(true).try_init();
        let args = arguments(&[
            "--width", "12", "--banks", "3", "--depth", "4", "--cycles", "400", "--ready-rate",
            "0.3", "--seed", "11",
        ]);
        let report = run(&args).unwrap();
        assert_eq!(report.delivered.len(), report.complete_rounds());
        assert!(!report.delivered.is_empty());
    }

    #[test]
    fn run_rejects_bad_depth() {
        let args = arguments(&["--depth", "6"]);
        assert!(run(&args).is_err());
    }

    #[test]
    fn run_reads_yaml_config() {
        let mut path = std::env::temp_dir();
        path.push("stream_test_config.yaml");
        std::fs::write(&path, "element_width: 4\nbank_count: 2\nbank_depth: 8\n").unwrap();
        let args = arguments(&["--config", path.to_str().unwrap(), "--cycles", "50"]);
        let config = args.aggregator_config().unwrap();
        assert_eq!(config.word_width(), 8);
        assert!(run(&args).is_ok());
        let _ = std::fs::remove_file(&path);
    }
}
