//! Crate-wide error type.
//!
//! Variants map 1:1 onto the error kinds used throughout the Debug
//! Interconnect client layers and the RSP-facing GDB server.

use std::io;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// Non-specific internal failure.
	#[error("internal failure: {0}")]
	Failure(String),

	/// Unable to reach or bind an endpoint, or the connect handshake was
	/// rejected.
	#[error("connection failed: {0}")]
	ConnectionFailed(String),

	/// Operation attempted on a closed channel.
	#[error("not connected")]
	NotConnected,

	/// No response arrived within the configured deadline.
	#[error("operation timed out")]
	TimedOut,

	/// The described module's type does not match the expected client
	/// layer (e.g. a CL-CDM call against a module that isn't a CDM).
	#[error("wrong module type: expected {expected}, got {actual}")]
	WrongModule { expected: &'static str, actual: String },

	/// RSP checksum mismatch or malformed escape sequence.
	#[error("corrupt RSP frame: {0}")]
	FrameCorrupt(String),

	/// A DI packet carried an unexpected type or payload size.
	#[error("protocol error: {0}")]
	Protocol(String),
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Self {
		Error::ConnectionFailed(e.to_string())
	}
}

impl From<zmq::Error> for Error {
	fn from(e: zmq::Error) -> Self {
		Error::ConnectionFailed(e.to_string())
	}
}
