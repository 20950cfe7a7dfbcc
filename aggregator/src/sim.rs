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


//! Cycle-by-cycle simulation of an aggregator between a random producer and
//! a random consumer.

use anyhow::{ensure, Context};
use bitvec::prelude::*;
use rand::Rng;
use rand_core::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::data::{concat, to_bit_string, Data};
use crate::hw::{Aggregator, Statistics, StepInputs};
use crate::vcd::{VcdWriter, DEFAULT_TOP_MODULE};

/// Default seed; simulations are deterministic unless a seed is given.
pub const DEFAULT_SEED: u64 = 0x87654321FEDCBA09u64;

#[derive(Default)]
pub struct SimulationCallbacks {
    vcd_writer: Option<Rc<RefCell<VcdWriter>>>,
}

impl SimulationCallbacks {
    pub fn get_vcd_writer(&mut self) -> Option<Rc<RefCell<VcdWriter>>> {
        self.vcd_writer.as_ref().map(Rc::clone)
    }

    /// Callbacks dumping a VCD trace into `path`.
    pub fn create_vcd_callbacks(path: &Path) -> anyhow::Result<Self> {
        let writer = VcdWriter::new(path)
            .with_context(|| format!("Failed to create VCD file {}", path.display()))?;
        Ok(Self {
            vcd_writer: Some(Rc::new(RefCell::new(writer))),
        })
    }

    pub fn vcd<F>(&mut self, f: F)
    where
        F: FnOnce(Rc<RefCell<VcdWriter>>),
    {
        if let Some(writer) = self.get_vcd_writer() {
            f(writer);
        }
    }
}

pub type OptionSimCallbacks<'a> = &'a mut SimulationCallbacks;

/// Behaviour of the producer and the consumer around the aggregator.
pub struct TrafficProperties {
    /// Probability that an idle producer has a new element ready in a cycle.
    pub write_rate: f64,

    /// Probability that the consumer asserts `read_ready` in a cycle.
    pub ready_rate: f64,

    /// Random number generator for the rates and the element values.
    /// Note: the RNG provided by the Default implementation is deterministic.
    pub rng: Box<dyn RngCore>,
}

impl TrafficProperties {
    pub fn seeded(write_rate: f64, ready_rate: f64, seed: u64) -> Self {
        Self {
            write_rate,
            ready_rate,
            rng: Box::new(Xoshiro256StarStar::seed_from_u64(seed)),
        }
    }
}

impl Default for TrafficProperties {
    /// A producer and a consumer that are always ready.
    fn default() -> Self {
        Self::seeded(1.0, 1.0, DEFAULT_SEED)
    }
}

/// What went in and what came out of a simulation.
#[derive(Clone, Debug)]
pub struct SimulationReport {
    pub bank_count: usize,
    /// elements accepted by the aggregator, in acceptance order
    pub accepted: Vec<Data>,
    /// valid words seen by the consumer, in delivery order
    pub delivered: Vec<Data>,
    pub statistics: Statistics,
}

impl SimulationReport {
    /// Check that every delivered word is the next round of accepted elements.
    pub fn verify(&self) -> anyhow::Result<()> {
        ensure!(
            self.delivered.len() * self.bank_count <= self.accepted.len(),
            "{} words delivered but only {} elements accepted",
            self.delivered.len(),
            self.accepted.len()
        );
        for (round, (word, elements)) in self
            .delivered
            .iter()
            .zip(self.accepted.chunks(self.bank_count))
            .enumerate()
        {
            let expected = concat(elements.iter().map(|element| element.as_bitslice()));
            ensure!(
                *word == expected,
                "round {}: delivered {} expected {}",
                round,
                to_bit_string(word, elements[0].len()),
                to_bit_string(&expected, elements[0].len())
            );
        }
        Ok(())
    }

    /// Number of complete rounds accepted.
    pub fn complete_rounds(&self) -> usize {
        self.accepted.len() / self.bank_count
    }
}

fn random_element(rng: &mut dyn RngCore, width: usize) -> Data {
    let mut element = BitVec::<usize, Lsb0>::with_capacity(width);
    while element.len() < width {
        let chunk = rng.next_u64();
        let take = (width - element.len()).min(64);
        element.extend_from_bitslice(&chunk.view_bits::<Lsb0>()[..take]);
    }
    element.into_boxed_bitslice()
}

/// Step `aggregator` for `cycles` cycles under `traffic`, then keep the
/// consumer ready until every queued round has been delivered.
///
/// The producer never requests a write while `full` is reported, and holds
/// an element until it is accepted.
pub fn simulate(
    aggregator: &mut Aggregator,
    cycles: usize,
    traffic: &mut TrafficProperties,
    callbacks: OptionSimCallbacks,
) -> anyhow::Result<SimulationReport> {
    ensure!(
        (0.0..=1.0).contains(&traffic.write_rate) && (0.0..=1.0).contains(&traffic.ready_rate),
        "traffic rates must be probabilities (write {}, ready {})",
        traffic.write_rate,
        traffic.ready_rate
    );
    let width = aggregator.config().element_width;
    let mut accepted = Vec::new();
    let mut delivered = Vec::new();
    let mut pending: Option<Data> = None;

    callbacks.vcd(|writer| VcdWriter::write_header(writer, &*aggregator));
    let drain_limit = aggregator.config().bank_depth + 2;
    let mut drain_cycles = 0;
    let mut cycle = 0;
    loop {
        let producing = cycle < cycles;
        if !producing {
            if !aggregator.output_valid() && aggregator.backlog() == 0 {
                break;
            }
            ensure!(
                drain_cycles < drain_limit,
                "aggregator did not drain within {} cycles",
                drain_limit
            );
            drain_cycles += 1;
        }
        if producing && pending.is_none() && traffic.rng.gen_bool(traffic.write_rate) {
            pending = Some(random_element(traffic.rng.as_mut(), width));
        }
        let read_ready = !producing || traffic.rng.gen_bool(traffic.ready_rate);
        let write = if producing && !aggregator.full() {
            pending.clone()
        } else {
            None
        };
        let inputs = StepInputs { write, read_ready };

        let _vcd_top_scope = callbacks
            .get_vcd_writer()
            .map(|writer| VcdWriter::managed_trace_scope(writer, DEFAULT_TOP_MODULE));
        callbacks.vcd(|writer| writer.borrow_mut().enter_cycle());
        let outputs = aggregator
            .step(&inputs, callbacks)
            .with_context(|| format!("step failed at cycle {}", cycle))?;
        callbacks.vcd(|writer| {
            writer
                .borrow_mut()
                .change_vector_immediately("sim_cycles", cycle as u64);
            writer.borrow_mut().end_cycle();
        });

        if outputs.write_accepted {
            if let Some(element) = pending.take() {
                accepted.push(element);
            }
        }
        if outputs.output.valid {
            delivered.push(outputs.output.data);
        }
        cycle += 1;
    }
    callbacks.vcd(|writer| writer.borrow_mut().flush_after_simulation());

    let statistics = aggregator.statistics().clone();
    log::info!(
        "simulated {} cycles: {} accepted, {} rejected, {} rounds, {} words, max backlog {}",
        statistics.cycles,
        statistics.accepted_writes,
        statistics.rejected_writes,
        statistics.completed_rounds,
        statistics.delivered_words,
        statistics.max_backlog
    );
    Ok(SimulationReport {
        bank_count: aggregator.config().bank_count,
        accepted,
        delivered,
        statistics,
    })
}
