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

/// Which branch of the valid/backlog update a step took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidUpdate {
    /// The consumer is not ready: nothing is signalled, a completed round is queued.
    Stalled,
    /// The consumer is ready and rounds are queued: one queued round is signalled.
    Draining,
    /// The consumer is ready and nothing is queued: a completed round is signalled.
    Steady,
}

/// The register values the controller commits at the end of a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterUpdate {
    pub output_valid: bool,
    pub backlog: usize,
    pub branch: ValidUpdate,
}

/// The aggregation/scheduling state machine.
///
/// It owns:
///   - the round-robin write-select cursor, pointing to the bank receiving the
///     next accepted write
///   - the backlog: completed rounds whose valid signal has not been delivered
///     because the consumer stalled
///   - the registered output-valid flag. The value decided while observing
///     the inputs of step `t` is what the consumer sees at step `t + 1`.
#[derive(Clone, Debug)]
pub struct AggregatorController {
    bank_count: usize,
    write_select: usize,
    backlog: usize,
    output_valid: bool,
}

impl AggregatorController {
    pub fn new(bank_count: usize) -> Self {
        Self {
            bank_count,
            write_select: 0,
            backlog: 0,
            output_valid: false,
        }
    }

    pub fn write_select(&self) -> usize {
        self.write_select
    }

    pub fn backlog(&self) -> usize {
        self.backlog
    }

    pub fn output_valid(&self) -> bool {
        self.output_valid
    }

    /// Advance the cursor past an accepted write.
    ///
    /// Returns true when the write was the last of its round.
    pub(super) fn accept_write(&mut self) -> bool {
        let round_complete = self.write_select == self.bank_count - 1;
        self.write_select = (self.write_select + 1) % self.bank_count;
        round_complete
    }

    /// Compute the registers for the next step.
    pub fn next_registers(&self, read_ready: bool, round_complete: bool) -> RegisterUpdate {
        if !read_ready {
            RegisterUpdate {
                output_valid: false,
                backlog: if round_complete {
                    self.backlog + 1
                } else {
                    self.backlog
                },
                branch: ValidUpdate::Stalled,
            }
        } else if self.backlog > 0 {
            // a round completing while one drains leaves the count unchanged
            RegisterUpdate {
                output_valid: true,
                backlog: if round_complete {
                    self.backlog
                } else {
                    self.backlog - 1
                },
                branch: ValidUpdate::Draining,
            }
        } else {
            RegisterUpdate {
                output_valid: round_complete,
                backlog: self.backlog,
                branch: ValidUpdate::Steady,
            }
        }
    }

    pub(super) fn commit(&mut self, update: RegisterUpdate) {
        log::trace!(
            "controller: {:?}, valid {} -> {}, backlog {} -> {}",
            update.branch,
            self.output_valid,
            update.output_valid,
            self.backlog,
            update.backlog
        );
        self.output_valid = update.output_valid;
        self.backlog = update.backlog;
    }

    pub fn reset(&mut self) {
        self.write_select = 0;
        self.backlog = 0;
        self.output_valid = false;
    }

    pub(super) fn vcd_trace(&self, writer: &Rc<RefCell<VcdWriter>>) {
        let mut writer = writer.borrow_mut();
        writer.change_vector("write_select", self.write_select as u32);
        writer.change_vector("backlog", self.backlog as u32);
        writer.change_vector("output_valid", self.output_valid);
    }
}

impl VcdComponent for AggregatorController {
    fn vcd_write_scope(&self, writer: Rc<RefCell<VcdWriter>>) {
        let _vcd_controller_scope = VcdWriter::managed_decl_scope(Rc::clone(&writer), "controller");
        let mut writer = writer.borrow_mut();
        writer.add_integer_var::<u32>("write_select");
        writer.add_integer_var::<u32>("backlog");
        writer.add_var(vcd_ext::VarType::Reg, 1, "output_valid", None);
    }

    fn vcd_init(&self, writer: Rc<RefCell<VcdWriter>>) {
        let _vcd_controller_scope =
            VcdWriter::managed_trace_scope(Rc::clone(&writer), "controller");
        let mut writer = writer.borrow_mut();
        writer.change_vector_immediately("write_select", self.write_select as u32);
        writer.change_vector_immediately("backlog", self.backlog as u32);
        writer.change_vector_immediately("output_valid", self.output_valid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller_with_backlog(backlog: usize) -> AggregatorController {
        let mut controller = AggregatorController::new(4);
        controller.backlog = backlog;
        controller
    }

    #[test]
    fn test_cursor_round_robin() {
        let mut controller = AggregatorController::new(3);
        let completions = (0..7)
            .map(|_| controller.accept_write())
            .collect::<Vec<_>>();
        assert_eq!(
            completions,
            vec![false, false, true, false, false, true, false]
        );
        assert_eq!(controller.write_select(), 1);
    }

    #[test]
    fn test_single_bank_completes_every_write() {
        let mut controller = AggregatorController::new(1);
        assert!(controller.accept_write());
        assert!(controller.accept_write());
        assert_eq!(controller.write_select(), 0);
    }

    #[test]
    fn test_stalled_queues_completed_round() {
        let controller = controller_with_backlog(2);
        let update = controller.next_registers(false, true);
        assert_eq!(update.branch, ValidUpdate::Stalled);
        assert!(!update.output_valid);
        assert_eq!(update.backlog, 3);

        let update = controller.next_registers(false, false);
        assert!(!update.output_valid);
        assert_eq!(update.backlog, 2);
    }

    #[test]
    fn test_draining_removes_one_round() {
        let controller = controller_with_backlog(2);
        let update = controller.next_registers(true, false);
        assert_eq!(update.branch, ValidUpdate::Draining);
        assert!(update.output_valid);
        assert_eq!(update.backlog, 1);
    }

    #[test]
    fn test_drain_and_completion_in_the_same_step() {
        let controller = controller_with_backlog(1);
        let update = controller.next_registers(true, true);
        assert_eq!(update.branch, ValidUpdate::Draining);
        assert!(update.output_valid);
        // one round added, one removed
        assert_eq!(update.backlog, 1);
    }

    #[test]
    fn test_steady_forwards_round_completion() {
        let controller = controller_with_backlog(0);
        let update = controller.next_registers(true, true);
        assert_eq!(update.branch, ValidUpdate::Steady);
        assert!(update.output_valid);
        assert_eq!(update.backlog, 0);

        let update = controller.next_registers(true, false);
        assert!(!update.output_valid);
        assert_eq!(update.backlog, 0);
    }

    #[test]
    fn test_commit_and_reset() {
        let mut controller = controller_with_backlog(0);
        controller.accept_write();
        let update = controller.next_registers(false, true);
        controller.commit(update);
        assert_eq!(controller.backlog(), 1);
        assert!(!controller.output_valid());
        controller.reset();
        assert_eq!(controller.backlog(), 0);
        assert_eq!(controller.write_select(), 0);
        assert!(!controller.output_valid());
    }
}
