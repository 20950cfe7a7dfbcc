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


//! A cycle-level model of a round-robin bank aggregator.
//!
//! Narrow elements from a single producer are written one per cycle into `N`
//! banks in round-robin order. Once a round of `N` writes has landed, all
//! banks are read together and presented to the consumer as one `N * W` bit
//! word, with a one-cycle registered valid flag and a backlog that absorbs
//! consumer stalls.

mod data;
mod error;
mod hw;
mod sim;
mod vcd;

// Public types
pub use crate::data::{concat, pack, to_bit_string, unpack, zeroed, Data, DataWithValidity};
pub use crate::error::Error;
pub use crate::hw::config::{BANK_COUNT, BANK_DEPTH, ELEMENT_WIDTH};
pub use crate::hw::{
    Aggregator, AggregatorConfig, AggregatorController, Bank, BankSet, RegisterUpdate,
    Statistics, StepInputs, StepOutputs, ValidUpdate, ViolationPolicy,
};
pub use crate::sim::{
    simulate, OptionSimCallbacks, SimulationCallbacks, SimulationReport, TrafficProperties,
    DEFAULT_SEED,
};
pub use crate::vcd::{VcdComponent, VcdWriter};
