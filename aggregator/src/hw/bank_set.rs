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

/// The ordered set of `N` structurally identical banks.
///
/// Bank order is significant: it is the round-robin write order, and bank
/// `k` supplies bits `[k * width, (k + 1) * width)` of the wide word.
#[derive(Clone, Debug)]
pub struct BankSet {
    banks: Vec<Bank>,
}

impl BankSet {
    pub fn new(count: usize, depth: usize, width: usize) -> Self {
        Self {
            banks: (0..count).map(|_| Bank::new(depth, width)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn bank(&self, index: usize) -> Option<&Bank> {
        self.banks.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bank> {
        self.banks.iter()
    }

    /// Width of the assembled output word.
    pub fn word_width(&self) -> usize {
        self.banks.iter().map(|bank| bank.width()).sum()
    }

    pub fn all_full(&self) -> bool {
        self.banks.iter().all(|bank| bank.is_full())
    }

    pub fn all_empty(&self) -> bool {
        self.banks.iter().all(|bank| bank.is_empty())
    }

    pub(super) fn write(&mut self, index: usize, value: &BitSlice<usize, Lsb0>) -> Result<(), Error> {
        self.banks[index].try_write(value)
    }

    /// Read every bank in lockstep and concatenate the elements, bank 0 lowest.
    ///
    /// Either all banks advance or none do.
    pub(super) fn read_all(&mut self) -> Result<Data, Error> {
        if self.banks.iter().any(|bank| bank.is_empty()) {
            return Err(Error::BankEmpty);
        }
        let mut elements = Vec::with_capacity(self.banks.len());
        for bank in self.banks.iter_mut() {
            elements.push(bank.try_read()?);
        }
        Ok(concat(elements))
    }

    pub fn reset(&mut self) {
        self.banks.iter_mut().for_each(Bank::reset);
    }

    pub fn debug_dump_memory(&self) {
        for (index, bank) in self.banks.iter().enumerate() {
            bank.debug_dump_memory(index);
        }
    }

    pub(super) fn vcd_trace(&self, writer: &Rc<RefCell<VcdWriter>>) {
        for (index, bank) in self.banks.iter().enumerate() {
            let _vcd_bank_scope =
                VcdWriter::managed_trace_scope(Rc::clone(writer), &format!("bank_{}", index));
            bank.vcd_trace(writer);
        }
    }
}

impl VcdComponent for BankSet {
    fn vcd_write_scope(&self, writer: Rc<RefCell<VcdWriter>>) {
        for (index, bank) in self.banks.iter().enumerate() {
            let _vcd_bank_scope =
                VcdWriter::managed_decl_scope(Rc::clone(&writer), &format!("bank_{}", index));
            bank.vcd_write_scope(Rc::clone(&writer));
        }
    }

    fn vcd_init(&self, writer: Rc<RefCell<VcdWriter>>) {
        for (index, bank) in self.banks.iter().enumerate() {
            let _vcd_bank_scope =
                VcdWriter::managed_trace_scope(Rc::clone(&writer), &format!("bank_{}", index));
            bank.vcd_init(Rc::clone(&writer));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_all_concatenates_low_bank_first() {
        let mut banks = BankSet::new(3, 2, 4);
        assert_eq!(banks.word_width(), 12);
        for (index, value) in [0x1u64, 0x2, 0x3].iter().enumerate() {
            banks.write(index, &pack(*value, 4)).unwrap();
        }
        assert!(!banks.all_empty());
        let word = banks.read_all().unwrap();
        assert_eq!(word.len(), 12);
        assert_eq!(unpack(&word), 0x321);
        assert!(banks.all_empty());
    }

    #[test]
    fn test_read_all_is_atomic() {
        let mut banks = BankSet::new(2, 2, 8);
        banks.write(0, &pack(0xab, 8)).unwrap();
        // bank 1 is empty, so bank 0 must not advance either
        assert_eq!(banks.read_all(), Err(Error::BankEmpty));
        assert_eq!(banks.bank(0).unwrap().occupancy(), 1);
        assert!(!banks.all_empty());
    }

    #[test]
    fn test_full_is_a_conjunction() {
        let mut banks = BankSet::new(2, 1, 8);
        banks.write(0, &pack(1, 8)).unwrap();
        assert!(banks.bank(0).unwrap().is_full());
        assert!(!banks.all_full());
        banks.write(1, &pack(2, 8)).unwrap();
        assert!(banks.all_full());
        banks.reset();
        assert!(banks.all_empty());
        assert!(!banks.all_full());
    }
}
