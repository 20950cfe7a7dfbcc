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


use bitvec::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

use crate::data::{concat, to_bit_string, zeroed, Data, DataWithValidity};
use crate::sim::OptionSimCallbacks;
use crate::vcd::{ChangeValue, VcdComponent, VcdWriter};
use crate::Error;

#[cfg(test)]
use crate::data::{pack, unpack};

pub(super) mod aggregator;
pub(super) mod bank;
pub(super) mod bank_set;
pub(super) mod config;
pub(super) mod controller;

pub use crate::hw::aggregator::{Aggregator, Statistics, StepInputs, StepOutputs};
pub use crate::hw::bank::Bank;
pub use crate::hw::bank_set::BankSet;
pub use crate::hw::config::{AggregatorConfig, ViolationPolicy};
pub use crate::hw::controller::{AggregatorController, RegisterUpdate, ValidUpdate};
