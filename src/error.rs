// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Error types for filter operations

use std::fmt;

/// ErrorKind is all kinds of Error raised by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// `populate` was called on a wrapper that already holds a filter.
    AlreadyPopulated,
    /// The key set is too large for the filter's 32-bit addressing.
    AllocFailed,
    /// Construction exhausted its seed retries; the key set exhibits
    /// pathological collisions.
    BuildFailed,
    /// A query or serialization was attempted on an empty wrapper.
    NotPopulated,
    /// A streamed key arrived out of order.
    OutOfOrder,
    /// A filter was added for a shard prefix that is already occupied.
    SlotOccupied,
    /// The sharded file already holds a filter for every prefix.
    CapacityExceeded,
    /// The file's identifying tag is malformed or of the wrong family,
    /// or the file is truncated.
    FormatError,
    /// The file's capacity field disagrees with the requested `shard_bits`.
    CapacityMismatch,
    /// The argument provided is invalid.
    InvalidArgument,
    /// An underlying filesystem or memory-mapping operation failed.
    Io,
}

impl ErrorKind {
    /// Convert this error kind instance into static str.
    pub const fn into_static(self) -> &'static str {
        match self {
            ErrorKind::AlreadyPopulated => "AlreadyPopulated",
            ErrorKind::AllocFailed => "AllocFailed",
            ErrorKind::BuildFailed => "BuildFailed",
            ErrorKind::NotPopulated => "NotPopulated",
            ErrorKind::OutOfOrder => "OutOfOrder",
            ErrorKind::SlotOccupied => "SlotOccupied",
            ErrorKind::CapacityExceeded => "CapacityExceeded",
            ErrorKind::FormatError => "FormatError",
            ErrorKind::CapacityMismatch => "CapacityMismatch",
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::Io => "Io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

/// Error is the error struct returned by all fallible functions of this
/// crate.
///
/// # Examples
///
/// ```
/// # use binfuse::error::Error;
/// # use binfuse::error::ErrorKind;
/// let err = Error::new(ErrorKind::InvalidArgument, "bad input");
/// assert_eq!(err.kind(), ErrorKind::InvalidArgument);
/// assert_eq!(err.message(), "bad input");
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: vec![],
        }
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Return error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return error's message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

// Convenience constructors
impl Error {
    pub(crate) fn already_populated() -> Self {
        Self::new(
            ErrorKind::AlreadyPopulated,
            "filter is already populated, provide all keys at once",
        )
    }

    pub(crate) fn not_populated() -> Self {
        Self::new(ErrorKind::NotPopulated, "filter is not populated")
    }

    pub(crate) fn build_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BuildFailed, msg)
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, msg)
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::FormatError, msg)
    }

    pub(crate) fn capacity_mismatch(expected: u32, found: u32) -> Self {
        Self::new(
            ErrorKind::CapacityMismatch,
            format!("wrong capacity: expected {expected}, found {found}"),
        )
    }

    pub(crate) fn io(op: &'static str, err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err.to_string()).with_context("op", op)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If alternate has been specified, we will print like Debug.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "   {k}: {v}")?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            write!(
                f,
                "{}",
                self.context
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
