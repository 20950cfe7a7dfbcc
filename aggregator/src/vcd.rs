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


use crate::data::{pack, Data, DataWithValidity};
use crate::hw::Aggregator;
use bitvec::prelude::*;
use chrono;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path;
use std::rc::Rc;
use vcd;

pub const DEFAULT_VCD_FILE: &str = "aggregator.vcd";
pub const DEFAULT_TOP_MODULE: &str = "aggregator_top";
const DEFAULT_VCD_HEADER: &str = "round-robin aggregator VCD";

#[derive(Clone, PartialEq)]
enum SizedData {
    Filled(BitBox<usize, Lsb0>),
    Undefined(usize),
}

#[derive(PartialEq)]
pub enum ChangeValue {
    Immediately,
    Defer,
}

/// Values that can be recorded as a VCD vector.
pub trait VcdValue {
    fn to_vcd_bits(&self) -> Data;
}

impl VcdValue for bool {
    fn to_vcd_bits(&self) -> Data {
        pack(*self as u64, 1)
    }
}

impl VcdValue for u32 {
    fn to_vcd_bits(&self) -> Data {
        pack(*self as u64, 32)
    }
}

impl VcdValue for u64 {
    fn to_vcd_bits(&self) -> Data {
        pack(*self, 64)
    }
}

impl VcdValue for Data {
    fn to_vcd_bits(&self) -> Data {
        self.clone()
    }
}

pub struct VcdWriter {
    writer: vcd::Writer<fs::File>,
    is_error_state: bool,
    scope_stack: Vec<String>,
    id_map: HashMap<String, vcd::IdCode>,
    last_value_map: HashMap<vcd::IdCode, SizedData>,
    deferred_changes: HashMap<vcd::IdCode, SizedData>,
    timestamp: u64,
}

pub struct VcdTraceScope {
    writer: Rc<RefCell<VcdWriter>>,
    scope: String,
}

impl Drop for VcdTraceScope {
    fn drop(&mut self) {
        self.writer.borrow_mut().leave_scope(self.scope.as_str());
    }
}

pub struct VcdDeclScope {
    writer: Rc<RefCell<VcdWriter>>,
    scope: String,
}

impl Drop for VcdDeclScope {
    fn drop(&mut self) {
        self.writer.borrow_mut().upscope(self.scope.as_str());
    }
}

impl VcdWriter {
    pub fn new(dst: &path::Path) -> io::Result<Self> {
        let dst_file = fs::File::create(dst)?;
        log::debug!("VCD file: {}", dst.display());
        Ok(Self {
            is_error_state: false,
            writer: vcd::Writer::new(dst_file),
            scope_stack: vec![],
            id_map: HashMap::new(),
            timestamp: 0,
            deferred_changes: HashMap::new(),
            last_value_map: HashMap::new(),
        })
    }

    /// A writer dumping into `DEFAULT_VCD_FILE` in the system temporary directory.
    pub fn in_temp_dir() -> io::Result<Self> {
        let mut vcd_path = std::env::temp_dir();
        vcd_path.push(DEFAULT_VCD_FILE);
        Self::new(&vcd_path)
    }

    fn vcd_error_handler(&mut self, err: io::Error) {
        if !self.is_error_state {
            self.is_error_state = true;
            log::error!("VCD writing failed with error {:?}", err)
        }
    }

    pub fn is_error_state(&self) -> bool {
        self.is_error_state
    }

    pub fn managed_decl_scope<T>(writer: Rc<RefCell<VcdWriter>>, scope: &T) -> VcdDeclScope
    where
        T: Display + ?Sized,
    {
        writer.borrow_mut().add_module(scope);
        VcdDeclScope {
            writer: Rc::clone(&writer),
            scope: scope.to_string(),
        }
    }

    pub fn managed_trace_scope<T>(writer: Rc<RefCell<VcdWriter>>, scope: &T) -> VcdTraceScope
    where
        T: Display + ?Sized,
    {
        writer.borrow_mut().enter_scope(scope);
        VcdTraceScope {
            writer: Rc::clone(&writer),
            scope: scope.to_string(),
        }
    }

    /// Declare every traced signal of `aggregator` and record its reset values
    /// at time 0.
    pub fn write_header(writer: Rc<RefCell<Self>>, aggregator: &Aggregator) {
        {
            let mut w = writer.borrow_mut();
            if let Err(err) = w.writer.comment(DEFAULT_VCD_HEADER) {
                w.vcd_error_handler(err);
            }
            let date = chrono::Utc::now().to_string();
            if let Err(err) = w.writer.date(date.as_str()) {
                w.vcd_error_handler(err);
            }
        }
        {
            let _vcd_decl_scope =
                VcdWriter::managed_decl_scope(Rc::clone(&writer), DEFAULT_TOP_MODULE);
            writer.borrow_mut().add_integer_var::<u64>("sim_cycles");
            aggregator.vcd_write_scope(Rc::clone(&writer));
        }
        {
            let mut w = writer.borrow_mut();
            if let Err(err) = w.writer.enddefinitions() {
                w.vcd_error_handler(err);
            }
        }
        {
            let _vcd_trace_scope =
                VcdWriter::managed_trace_scope(Rc::clone(&writer), DEFAULT_TOP_MODULE);
            writer.borrow_mut().enter_cycle();
            writer
                .borrow_mut()
                .change_vector_immediately("sim_cycles", 0u64);
            aggregator.vcd_init(Rc::clone(&writer));
            writer.borrow_mut().end_cycle();
        }
    }

    fn enter_scope<T: Display + ?Sized>(&mut self, name: &T) {
        self.scope_stack.push(name.to_string())
    }

    fn record_change(&mut self, id_code: vcd::IdCode, sized_data: &SizedData) {
        if self.is_error_state {
            return;
        }
        self._record_change(id_code, sized_data)
            .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    fn _record_change(&mut self, id_code: vcd::IdCode, sized_data: &SizedData) -> io::Result<()> {
        if let Some(last_sized_data) = self.last_value_map.get(&id_code) {
            if last_sized_data == sized_data {
                return Ok(());
            }
        }
        match sized_data {
            SizedData::Filled(data) => self.writer.change_vector(
                id_code,
                data.iter()
                    .rev()
                    .map(|b| (*b).into())
                    .collect::<Vec<_>>()
                    .as_slice(),
            )?,
            SizedData::Undefined(size) => self.writer.change_vector(
                id_code,
                (0..*size)
                    .map(|_| vcd::Value::X)
                    .collect::<Vec<_>>()
                    .as_slice(),
            )?,
        };
        self.last_value_map.insert(id_code, sized_data.clone());
        Ok(())
    }

    /// Record a change that becomes visible at the start of the next cycle.
    pub fn change_vector<V: VcdValue>(&mut self, name: &str, v: V) {
        if let Some(id_code) = self.lookup_id_code(name) {
            if cfg!(feature = "trace-echo-vcd-signal-changes") {
                log::trace!("VCD changing {}", self.scoped_name(name));
            }
            self.deferred_changes
                .insert(id_code, SizedData::Filled(v.to_vcd_bits()));
        }
    }

    pub fn change_vector_immediately<V: VcdValue>(&mut self, name: &str, v: V) {
        if let Some(id_code) = self.lookup_id_code(name) {
            if cfg!(feature = "trace-echo-vcd-signal-changes") {
                log::trace!("VCD changing {}", self.scoped_name(name));
            }
            self.record_change(id_code, &SizedData::Filled(v.to_vcd_bits()));
        }
    }

    /// Record a word that is only meaningful when valid; invalid words are
    /// dumped as `x`.
    pub fn change_word(&mut self, name: &str, word: &DataWithValidity, change_value: ChangeValue) {
        if let Some(id_code) = self.lookup_id_code(name) {
            if cfg!(feature = "trace-echo-vcd-signal-changes") {
                log::trace!("VCD changing {}", self.scoped_name(name));
            }
            let sized_data = if word.valid {
                SizedData::Filled(word.data.clone())
            } else {
                SizedData::Undefined(word.data.len())
            };
            if change_value == ChangeValue::Defer {
                self.deferred_changes.insert(id_code, sized_data);
            } else {
                self.record_change(id_code, &sized_data);
            }
        }
    }

    fn lookup_id_code(&self, name: &str) -> Option<vcd::IdCode> {
        let scoped_name = self.scoped_name(name);
        if let Some(id_code) = self.id_map.get(scoped_name.as_str()) {
            Some(*id_code)
        } else {
            log::warn!(
                "No such scoped name {} was defined for VCD dumps.",
                scoped_name
            );
            None
        }
    }

    pub fn flush_after_simulation(&mut self) {
        self.enter_cycle();
        self.end_cycle();
    }

    pub fn enter_cycle(&mut self) {
        if self.is_error_state {
            return;
        }
        self._enter_cycle()
            .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    fn _enter_cycle(&mut self) -> io::Result<()> {
        self.writer.timestamp(self.timestamp)?;
        // Deferred changes belong to the cycle we have just begun.
        let deferred_changes: HashMap<vcd::IdCode, SizedData> =
            self.deferred_changes.drain().collect();
        for (id_code, data) in deferred_changes {
            self._record_change(id_code, &data)?;
        }
        Ok(())
    }

    pub fn end_cycle(&mut self) {
        if self.is_error_state {
            return;
        }
        self._end_cycle()
            .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    fn _end_cycle(&mut self) -> io::Result<()> {
        self.writer.end()?;
        self.timestamp += 1;
        Ok(())
    }

    fn leave_scope<T: Display + ?Sized>(&mut self, scope: &T) {
        let popped_scope = self.scope_stack.pop();
        debug_assert_eq!(popped_scope, Some(scope.to_string()));
    }

    fn add_module<T: Display + ?Sized>(&mut self, name: &T) {
        if self.is_error_state {
            return;
        }
        self._add_module::<T>(name)
            .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    fn _add_module<T: Display + ?Sized>(&mut self, name: &T) -> io::Result<()> {
        self.writer.add_module(&name.to_string())?;
        self.scope_stack.push(name.to_string());
        Ok(())
    }

    fn upscope<T: Display + ?Sized>(&mut self, scope: &T) {
        if self.is_error_state {
            return;
        }
        self._upscope::<T>(scope)
            .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    fn _upscope<T: Display + ?Sized>(&mut self, scope: &T) -> io::Result<()> {
        self.leave_scope(scope);
        self.writer.upscope()
    }

    pub fn add_integer_var<T: Sized>(&mut self, reference: &str) {
        if self.is_error_state {
            return;
        }
        self._add_var(
            vcd::VarType::Integer,
            std::mem::size_of::<T>() * 8,
            reference,
            None,
        )
        .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    pub fn add_var(
        &mut self,
        var_type: vcd::VarType,
        width: usize,
        reference: &str,
        index: Option<vcd::ReferenceIndex>,
    ) {
        if self.is_error_state {
            return;
        }
        self._add_var(var_type, width, reference, index)
            .unwrap_or_else(|err| self.vcd_error_handler(err));
    }

    fn _add_var(
        &mut self,
        var_type: vcd::VarType,
        width: usize,
        reference: &str,
        index: Option<vcd::ReferenceIndex>,
    ) -> io::Result<()> {
        let var_id = self
            .writer
            .add_var(var_type, width as u32, &reference.to_string(), index)?;
        self.add_id_map(reference, var_id);
        Ok(())
    }

    fn scoped_name(&self, name: &str) -> String {
        self.scope_stack.join(".") + "." + name
    }

    fn add_id_map(&mut self, name: &str, vcd_id: vcd::IdCode) {
        let scoped_name = self.scoped_name(name);
        if self.id_map.contains_key(scoped_name.as_str()) {
            log::warn!("Scoped name {} was redefined for VCD dumps.", scoped_name);
        }
        self.id_map.insert(scoped_name, vcd_id);
    }
}

/// An object implementing the VcdComponent can declare and initialize values to
/// be traced by a VCD. Each such object is responsible for calling their inner
/// VcdComponent objects.
///
/// The aggregator declares its own signals in the top scope and delegates to
/// the bank set, which opens one `bank_<k>` scope per bank, so the dump holds
/// e.g. `aggregator_top.aggregator.backlog` and
/// `aggregator_top.aggregator.bank_0.write_ptr`.
pub trait VcdComponent {
    /// Declare the variables to be traced, and call `vcd_write_scope` on
    /// members implementing `VcdComponent`.
    fn vcd_write_scope(&self, vcd_writer: Rc<RefCell<VcdWriter>>);

    /// Record the initial value of traced variables, and call `vcd_init` on
    /// members implementing `VcdComponent`.
    fn vcd_init(&self, vcd_writer: Rc<RefCell<VcdWriter>>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_names() {
        let mut path = std::env::temp_dir();
        path.push("aggregator_vcd_scoped_names.vcd");
        let writer = Rc::new(RefCell::new(VcdWriter::new(&path).unwrap()));
        {
            let _top = VcdWriter::managed_decl_scope(Rc::clone(&writer), "top");
            let _inner = VcdWriter::managed_decl_scope(Rc::clone(&writer), "inner");
            writer.borrow_mut().add_integer_var::<u32>("counter");
        }
        assert!(writer.borrow().scope_stack.is_empty());
        assert!(writer.borrow().id_map.contains_key("top.inner.counter"));
        {
            let _top = VcdWriter::managed_trace_scope(Rc::clone(&writer), "top");
            let _inner = VcdWriter::managed_trace_scope(Rc::clone(&writer), "inner");
            assert!(writer.borrow().lookup_id_code("counter").is_some());
            assert!(writer.borrow().lookup_id_code("missing").is_none());
        }
        assert!(!writer.borrow().is_error_state());
        let _ = fs::remove_file(&path);
    }
}
