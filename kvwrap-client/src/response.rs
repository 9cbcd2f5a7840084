//! # Response
//!
//! The converted, success-flagged result of one command. A failed response
//! carries a human-readable diagnostic in place of data.

use std::cmp::Ordering;
use std::fmt;

use kvwrap_common::NIL;

use crate::convert::{from_wire, truthy, FromWire, ToWire};
use crate::error::{ClientError, ClientResult, ConversionError};

/// Why a response failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Send/receive failed, including after the single retry.
    Transport,
    /// No live session and reconnecting failed.
    NotConnected,
    /// The server returned an error reply.
    Protocol,
    /// The response queue was empty.
    QueueUnderflow,
}

/// Result of one command, or one entry read back from the response queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Response {
    payload: String,
    failure: Option<FailureKind>,
}

impl Default for Response {
    fn default() -> Self {
        Response::success(String::new())
    }
}

impl Response {
    /// Successful response with the given payload.
    pub fn success(payload: impl Into<String>) -> Self {
        Response {
            payload: payload.into(),
            failure: None,
        }
    }

    /// Failed response carrying a diagnostic.
    pub fn failure(kind: FailureKind, diagnostic: impl Into<String>) -> Self {
        Response {
            payload: diagnostic.into(),
            failure: Some(kind),
        }
    }

    /// Payload text, or the diagnostic of a failed response.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Consumes the response, returning its payload.
    pub fn into_payload(self) -> String {
        self.payload
    }

    /// True unless the command failed.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Why the command failed, if it did.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure
    }

    /// True for a successful nil reply.
    pub fn is_nil(&self) -> bool {
        self.is_success() && self.payload == NIL
    }

    /// Converts the payload, falling back to `T::default()` when it does not
    /// parse.
    pub fn get<T: FromWire + Default>(&self) -> T {
        from_wire(&self.payload)
    }

    /// Converts the payload to `T`, reporting failure instead of defaulting.
    pub fn try_get<T: FromWire>(&self) -> Result<T, ConversionError> {
        T::try_from_wire(&self.payload)
    }

    /// Success and a truthy payload (`"OK"`, nonzero integers).
    pub fn truthy(&self) -> bool {
        self.is_success() && truthy(&self.payload)
    }

    /// Maps a failed response to the matching [`ClientError`].
    pub fn into_result(self) -> ClientResult<Response> {
        match self.failure {
            None => Ok(self),
            Some(FailureKind::Protocol) => Err(ClientError::Protocol(self.payload)),
            Some(FailureKind::QueueUnderflow) => Err(ClientError::QueueUnderflow(self.payload)),
            Some(FailureKind::Transport) | Some(FailureKind::NotConnected) => {
                Err(ClientError::Transport(self.payload))
            }
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.payload)
    }
}

impl FromWire for Response {
    fn try_from_wire(text: &str) -> Result<Self, ConversionError> {
        Ok(Response::success(text))
    }
}

/// A response used as an argument sends its payload.
impl ToWire for Response {
    fn try_to_wire(&self) -> Result<String, ConversionError> {
        Ok(self.payload.clone())
    }
}

impl PartialEq<str> for Response {
    fn eq(&self, other: &str) -> bool {
        self.payload == other
    }
}

impl PartialEq<&str> for Response {
    fn eq(&self, other: &&str) -> bool {
        self.payload == *other
    }
}

impl PartialEq<String> for Response {
    fn eq(&self, other: &String) -> bool {
        &self.payload == other
    }
}

impl PartialOrd<&str> for Response {
    fn partial_cmp(&self, other: &&str) -> Option<Ordering> {
        Some(self.payload.as_str().cmp(*other))
    }
}

impl PartialEq<bool> for Response {
    fn eq(&self, other: &bool) -> bool {
        self.get::<bool>() == *other
    }
}

// Comparisons against numbers go through conversion, so a non-numeric
// payload compares as the type's default.
macro_rules! numeric_comparisons {
    ($($ty:ty),* $(,)?) => {
        $(
            impl PartialEq<$ty> for Response {
                fn eq(&self, other: &$ty) -> bool {
                    self.get::<$ty>() == *other
                }
            }

            impl PartialEq<Response> for $ty {
                fn eq(&self, other: &Response) -> bool {
                    other == self
                }
            }

            impl PartialOrd<$ty> for Response {
                fn partial_cmp(&self, other: &$ty) -> Option<Ordering> {
                    self.get::<$ty>().partial_cmp(other)
                }
            }

            impl PartialOrd<Response> for $ty {
                fn partial_cmp(&self, other: &Response) -> Option<Ordering> {
                    self.partial_cmp(&other.get::<$ty>())
                }
            }
        )*
    };
}

numeric_comparisons!(i32, i64, u32, u64, usize, f32);

// Doubles compare at single precision.
impl PartialEq<f64> for Response {
    fn eq(&self, other: &f64) -> bool {
        self.get::<f32>() == *other as f32
    }
}

impl PartialOrd<f64> for Response {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.get::<f32>().partial_cmp(&(*other as f32))
    }
}
