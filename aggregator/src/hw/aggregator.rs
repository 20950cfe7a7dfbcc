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


use super::*;
use ::vcd as vcd_ext;

/// The inputs sampled by one evaluation step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepInputs {
    /// The producer's element, if it requests a write this step.
    pub write: Option<Data>,
    /// The consumer can take a word on the next step.
    pub read_ready: bool,
}

impl StepInputs {
    pub fn idle(read_ready: bool) -> Self {
        Self {
            write: None,
            read_ready,
        }
    }

    pub fn write(value: Data, read_ready: bool) -> Self {
        Self {
            write: Some(value),
            read_ready,
        }
    }

    pub fn write_request(&self) -> bool {
        self.write.is_some()
    }
}

/// The outputs of one evaluation step.
///
/// `full` and `empty` are computed from the bank pointers as they were at the
/// start of the step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutputs {
    pub full: bool,
    pub empty: bool,
    /// The wide word; `data` holds the last word read when not valid.
    pub output: DataWithValidity,
    pub write_accepted: bool,
    pub round_complete: bool,
}

/// Running counters, cleared on reset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Statistics {
    pub cycles: u64,
    pub accepted_writes: u64,
    pub rejected_writes: u64,
    pub completed_rounds: u64,
    pub delivered_words: u64,
    pub max_backlog: usize,
}

/// A bank set and the controller that schedules it.
///
/// Each call to `step` is one clock tick: the registered valid flag decides
/// whether every bank is read, at most one bank is written, and the
/// valid/backlog registers are updated for the next tick.
#[derive(Clone, Debug)]
pub struct Aggregator {
    config: AggregatorConfig,
    banks: BankSet,
    controller: AggregatorController,
    /// the last word read, presented (stale) while not valid
    last_word: Data,
    statistics: Statistics,
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Result<Self, Error> {
        config.validate()?;
        log::debug!(
            "aggregator: {} banks x {} elements x {} bits, {} bit words",
            config.bank_count,
            config.bank_depth,
            config.element_width,
            config.word_width()
        );
        Ok(Self {
            banks: BankSet::new(config.bank_count, config.bank_depth, config.element_width),
            controller: AggregatorController::new(config.bank_count),
            last_word: zeroed(config.word_width()),
            statistics: Statistics::default(),
            config,
        })
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Every bank is full; the producer must not write.
    pub fn full(&self) -> bool {
        self.banks.all_full()
    }

    /// Every bank is empty.
    pub fn empty(&self) -> bool {
        self.banks.all_empty()
    }

    pub fn backlog(&self) -> usize {
        self.controller.backlog()
    }

    pub fn output_valid(&self) -> bool {
        self.controller.output_valid()
    }

    pub fn write_select(&self) -> usize {
        self.controller.write_select()
    }

    pub fn bank(&self, index: usize) -> Option<&Bank> {
        self.banks.bank(index)
    }

    pub fn banks(&self) -> &BankSet {
        &self.banks
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Run the aggregator for one step.
    pub fn step(
        &mut self,
        inputs: &StepInputs,
        callbacks: OptionSimCallbacks,
    ) -> Result<StepOutputs, Error> {
        let full = self.banks.all_full();
        let empty = self.banks.all_empty();
        let valid = self.controller.output_valid();
        log::trace!(
            "aggregator: write {:?}, read_ready {}, full {}, empty {}, valid {}, select {}, backlog {}",
            inputs.write.as_ref().map(|v| to_bit_string(v, self.config.element_width)),
            inputs.read_ready,
            full,
            empty,
            valid,
            self.controller.write_select(),
            self.controller.backlog()
        );

        // Check every precondition before any state changes.
        if let Some(value) = &inputs.write {
            if value.len() != self.config.element_width {
                return Err(Error::InvalidWidth {
                    expected: self.config.element_width,
                    actual: value.len(),
                });
            }
            if full && self.config.violation_policy == ViolationPolicy::Reject {
                return Err(Error::WriteWhileFull);
            }
        }
        if valid && empty {
            log::error!("aggregator: output valid with no round stored");
            return Err(Error::ReadWhileEmpty);
        }

        // Read side: the registered flag decides, all banks advance together.
        let output = if valid {
            let word = self.banks.read_all()?;
            self.last_word = word.clone();
            self.statistics.delivered_words += 1;
            DataWithValidity {
                data: word,
                valid: true,
            }
        } else {
            DataWithValidity {
                data: self.last_word.clone(),
                valid: false,
            }
        };

        // Write side.
        let mut write_accepted = false;
        let mut round_complete = false;
        if let Some(value) = &inputs.write {
            if full {
                log::warn!("aggregator: write rejected, bank set full");
                self.statistics.rejected_writes += 1;
            } else {
                let target = self.controller.write_select();
                match self.banks.write(target, value) {
                    Ok(()) => {
                        write_accepted = true;
                        round_complete = self.controller.accept_write();
                        self.statistics.accepted_writes += 1;
                    }
                    Err(Error::BankFull) => {
                        // banks out of step: never overwrite unread data
                        log::warn!("aggregator: write rejected, bank {} full", target);
                        self.statistics.rejected_writes += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        if round_complete {
            log::debug!("aggregator: round complete");
            self.statistics.completed_rounds += 1;
        }

        let update = self
            .controller
            .next_registers(inputs.read_ready, round_complete);
        self.controller.commit(update);
        self.statistics.cycles += 1;
        self.statistics.max_backlog = self.statistics.max_backlog.max(update.backlog);

        callbacks.vcd(|writer| self.vcd_trace(&writer, full, empty, &output));

        Ok(StepOutputs {
            full,
            empty,
            output,
            write_accepted,
            round_complete,
        })
    }

    /// Restore the power-on state: pointers, cursor, backlog and valid at zero.
    pub fn reset(&mut self) {
        log::debug!("aggregator: reset");
        self.banks.reset();
        self.controller.reset();
        self.last_word = zeroed(self.config.word_width());
        self.statistics = Statistics::default();
    }

    pub fn debug_dump_memory(&self) {
        log::debug!(
            "aggregator: select {}, backlog {}, valid {}",
            self.controller.write_select(),
            self.controller.backlog(),
            self.controller.output_valid()
        );
        self.banks.debug_dump_memory();
    }

    fn vcd_trace(
        &self,
        writer: &Rc<RefCell<VcdWriter>>,
        full: bool,
        empty: bool,
        output: &DataWithValidity,
    ) {
        let _vcd_aggregator_scope =
            VcdWriter::managed_trace_scope(Rc::clone(writer), "aggregator");
        {
            let mut writer = writer.borrow_mut();
            writer.change_vector("full", full);
            writer.change_vector("empty", empty);
            writer.change_vector("valid", output.valid);
            writer.change_word("data", output, ChangeValue::Defer);
        }
        {
            let _vcd_controller_scope =
                VcdWriter::managed_trace_scope(Rc::clone(writer), "controller");
            self.controller.vcd_trace(writer);
        }
        self.banks.vcd_trace(writer);
    }
}

impl VcdComponent for Aggregator {
    fn vcd_write_scope(&self, writer: Rc<RefCell<VcdWriter>>) {
        let _vcd_aggregator_scope =
            VcdWriter::managed_decl_scope(Rc::clone(&writer), "aggregator");
        {
            let mut writer = writer.borrow_mut();
            writer.add_var(vcd_ext::VarType::Wire, 1, "full", None);
            writer.add_var(vcd_ext::VarType::Wire, 1, "empty", None);
            writer.add_var(vcd_ext::VarType::Wire, 1, "valid", None);
            writer.add_var(
                vcd_ext::VarType::Wire,
                self.config.word_width(),
                "data",
                None,
            );
        }
        self.controller.vcd_write_scope(Rc::clone(&writer));
        self.banks.vcd_write_scope(Rc::clone(&writer));
    }

    fn vcd_init(&self, writer: Rc<RefCell<VcdWriter>>) {
        let _vcd_aggregator_scope =
            VcdWriter::managed_trace_scope(Rc::clone(&writer), "aggregator");
        {
            let mut writer = writer.borrow_mut();
            writer.change_vector_immediately("full", self.full());
            writer.change_vector_immediately("empty", self.empty());
            writer.change_vector_immediately("valid", false);
            writer.change_word(
                "data",
                &DataWithValidity::invalid(self.config.word_width()),
                ChangeValue::Immediately,
            );
        }
        self.controller.vcd_init(Rc::clone(&writer));
        self.banks.vcd_init(Rc::clone(&writer));
    }
}
