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

/// A Bank is one channel's circular buffer.
///
/// It consists of:
///   - a memory of `depth` elements, each `width` bits wide
///   - a write pointer and a read pointer. Both are `log2(depth) + 1` bits
///     wide: the low bits address the memory, the top (wrap) bit flips every
///     time the pointer passes the end of the memory. Equal pointers mean
///     empty; equal low bits with different wrap bits mean full.
#[derive(Clone, Debug)]
pub struct Bank {
    memory: Box<[Data]>,
    width: usize,
    write_ptr: usize,
    read_ptr: usize,
}

impl Bank {
    /// Build a bank of `depth` zeroed elements.
    ///
    /// `depth` must be a power of two; the configuration is validated before
    /// any bank is built.
    pub fn new(depth: usize, width: usize) -> Self {
        debug_assert!(depth.is_power_of_two());
        Self {
            memory: (0..depth).map(|_| zeroed(width)).collect(),
            width,
            write_ptr: 0,
            read_ptr: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.memory.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn write_ptr(&self) -> usize {
        self.write_ptr
    }

    pub fn read_ptr(&self) -> usize {
        self.read_ptr
    }

    // pointers wrap through the full log2(depth) + 1 bit range
    fn ptr_mask(&self) -> usize {
        2 * self.depth() - 1
    }

    fn addr_mask(&self) -> usize {
        self.depth() - 1
    }

    pub fn is_full(&self) -> bool {
        (self.write_ptr ^ self.read_ptr) == self.depth()
    }

    pub fn is_empty(&self) -> bool {
        self.write_ptr == self.read_ptr
    }

    /// Number of unread elements, in `[0, depth]`.
    pub fn occupancy(&self) -> usize {
        self.write_ptr.wrapping_sub(self.read_ptr) & self.ptr_mask()
    }

    /// Store `value` at the write pointer and advance it.
    pub fn try_write(&mut self, value: &BitSlice<usize, Lsb0>) -> Result<(), Error> {
        if value.len() != self.width {
            return Err(Error::InvalidWidth {
                expected: self.width,
                actual: value.len(),
            });
        }
        if self.is_full() {
            return Err(Error::BankFull);
        }
        let addr = self.write_ptr & self.addr_mask();
        self.memory[addr].copy_from_bitslice(value);
        self.write_ptr = (self.write_ptr + 1) & self.ptr_mask();
        Ok(())
    }

    /// Return the element at the read pointer and advance it.
    pub fn try_read(&mut self) -> Result<&BitSlice<usize, Lsb0>, Error> {
        if self.is_empty() {
            return Err(Error::BankEmpty);
        }
        let addr = self.read_ptr & self.addr_mask();
        self.read_ptr = (self.read_ptr + 1) & self.ptr_mask();
        Ok(&self.memory[addr])
    }

    pub fn reset(&mut self) {
        self.write_ptr = 0;
        self.read_ptr = 0;
        for element in self.memory.iter_mut() {
            element.fill(false);
        }
    }

    pub fn debug_dump_memory(&self, index: usize) {
        log::debug!(
            "bank_{}[{}] write_ptr {} read_ptr {} occupancy {}",
            index,
            self.depth(),
            self.write_ptr,
            self.read_ptr,
            self.occupancy()
        );
        if cfg!(feature = "trace-bank-memory-contents") {
            for (addr, element) in self.memory.iter().enumerate() {
                log::trace!("{}: {}", addr, to_bit_string(element, self.width));
            }
        }
    }

    pub(super) fn vcd_trace(&self, writer: &Rc<RefCell<VcdWriter>>) {
        let mut writer = writer.borrow_mut();
        writer.change_vector("write_ptr", self.write_ptr as u32);
        writer.change_vector("read_ptr", self.read_ptr as u32);
        writer.change_vector("full", self.is_full());
        writer.change_vector("empty", self.is_empty());
    }
}

impl VcdComponent for Bank {
    fn vcd_write_scope(&self, writer: Rc<RefCell<VcdWriter>>) {
        let mut writer = writer.borrow_mut();
        writer.add_integer_var::<u32>("write_ptr");
        writer.add_integer_var::<u32>("read_ptr");
        writer.add_var(vcd_ext::VarType::Wire, 1, "full", None);
        writer.add_var(vcd_ext::VarType::Wire, 1, "empty", None);
    }

    fn vcd_init(&self, writer: Rc<RefCell<VcdWriter>>) {
        let mut writer = writer.borrow_mut();
        writer.change_vector_immediately("write_ptr", self.write_ptr as u32);
        writer.change_vector_immediately("read_ptr", self.read_ptr as u32);
        writer.change_vector_immediately("full", self.is_full());
        writer.change_vector_immediately("empty", self.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_fill_and_drain() {
        const DEPTH: usize = 4;
        let mut bank = Bank::new(DEPTH, 8);
        assert!(bank.is_empty());
        assert!(!bank.is_full());

        for v in 0..DEPTH as u64 {
            assert!(bank.try_write(&pack(0x10 + v, 8)).is_ok());
        }
        assert!(bank.is_full());
        assert!(!bank.is_empty());
        assert_eq!(bank.occupancy(), DEPTH);
        // low bits coincide, wrap bits differ
        assert_eq!(bank.write_ptr(), DEPTH);
        assert_eq!(bank.read_ptr(), 0);

        assert_eq!(bank.try_write(&pack(0xff, 8)), Err(Error::BankFull));
        assert_eq!(bank.write_ptr(), DEPTH);

        for v in 0..DEPTH as u64 {
            let element = bank.try_read().unwrap();
            assert_eq!(unpack(element), 0x10 + v);
        }
        assert!(bank.is_empty());
        assert_eq!(bank.try_read().unwrap_err(), Error::BankEmpty);
    }

    #[test]
    fn test_bank_pointer_wraparound() {
        let mut bank = Bank::new(2, 4);
        // push the pointers all the way around the 2-bit range twice
        for v in 0..8u64 {
            bank.try_write(&pack(v, 4)).unwrap();
            assert_eq!(bank.occupancy(), 1);
            assert_eq!(unpack(bank.try_read().unwrap()), v);
            assert!(bank.is_empty());
            assert!(bank.write_ptr() < 4);
        }
        assert_eq!(bank.write_ptr(), 0);
        assert_eq!(bank.read_ptr(), 0);

        // full with the wrap bit set on the write side only
        bank.try_write(&pack(1, 4)).unwrap();
        bank.try_read().unwrap();
        bank.try_write(&pack(2, 4)).unwrap();
        bank.try_write(&pack(3, 4)).unwrap();
        assert_eq!(bank.read_ptr(), 1);
        assert_eq!(bank.write_ptr(), 3);
        assert!(bank.is_full());
        assert_eq!(bank.occupancy(), 2);
    }

    #[test]
    fn test_bank_depth_one() {
        let mut bank = Bank::new(1, 3);
        bank.try_write(&pack(5, 3)).unwrap();
        assert!(bank.is_full());
        assert_eq!(bank.try_write(&pack(6, 3)), Err(Error::BankFull));
        assert_eq!(unpack(bank.try_read().unwrap()), 5);
        assert!(bank.is_empty());
    }

    #[test]
    fn test_bank_rejects_wrong_width() {
        let mut bank = Bank::new(2, 8);
        assert_eq!(
            bank.try_write(&pack(1, 7)),
            Err(Error::InvalidWidth {
                expected: 8,
                actual: 7
            })
        );
        assert!(bank.is_empty());
    }

    #[test]
    fn test_bank_reset() {
        let mut bank = Bank::new(2, 8);
        bank.try_write(&pack(0xaa, 8)).unwrap();
        bank.reset();
        assert!(bank.is_empty());
        assert_eq!(bank.write_ptr(), 0);
        bank.try_write(&pack(0xbb, 8)).unwrap();
        assert_eq!(unpack(bank.try_read().unwrap()), 0xbb);
    }
}
