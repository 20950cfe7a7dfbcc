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


use std::fmt;

#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// A write was issued to a bank whose every slot holds unread data.
    BankFull,
    /// A read was issued to a bank holding no unread data.
    BankEmpty,
    /// The producer requested a write while the aggregator reported full.
    WriteWhileFull,
    /// The registered valid flag was set but the bank set had nothing to read.
    ReadWhileEmpty,
    InvalidWidth {
        expected: usize,
        actual: usize,
    },
    InvalidConfiguration(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::WriteWhileFull => write!(f, "ERROR: write rejected: bank set full"),
            Self::ReadWhileEmpty => write!(f, "ERROR: read issued while bank set empty"),
            Self::InvalidWidth { expected, actual } => {
                write!(
                    f,
                    "ERROR: Invalid value width {} (expected {} bits)",
                    actual, expected
                )
            }
            Self::InvalidConfiguration(reason) => {
                write!(f, "ERROR: Invalid configuration: {}", reason)
            }
            _ => write!(f, "{:?}", self),
        }
    }
}

// Needed so that `anyhow::Result` accepts our errors in the traffic
// simulation and the command line driver.
impl std::error::Error for Error {}
