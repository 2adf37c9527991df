//! Customized unified error type.

use std::fmt;
use std::io;
use std::net;
use std::num;

/// Customized error type for QuorumKV.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct KvError(pub String);

impl KvError {
    /// Builds an error out of anything printable.
    pub fn msg(m: impl ToString) -> Self {
        KvError(m.to_string())
    }
}

impl fmt::Display for KvError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0) // do not display literal quotes
    }
}

impl std::error::Error for KvError {}

// Helper macro for saving boiler-plate `impl From<T>`s for transparent
// conversion from various common error types to `KvError`.
macro_rules! impl_from_error {
    ($error:ty) => {
        impl From<$error> for KvError {
            fn from(e: $error) -> Self {
                // just store the source error's string representation
                KvError(e.to_string())
            }
        }
    };
}

impl_from_error!(io::Error);
impl_from_error!(net::AddrParseError);
impl_from_error!(num::ParseIntError);
impl_from_error!(num::ParseFloatError);
impl_from_error!(tokio::time::error::Elapsed);
impl_from_error!(tokio::task::JoinError);
