//! RSP framing: the `$payload#checksum` envelope, `}`-escaping, and the
//! incremental parser that turns a byte stream from the GDB socket into
//! complete packets.
//!
//! Grounded in `examples/original_source/src/libosd/gdbserver.c`'s
//! `validate_rsp_packet`/`receive_rsp_packet`/`send_rsp_packet` and the
//! `read_packet` state machine of the `gdbstub` reference crate in
//! `examples/other_examples/`. spec.md §9 calls out that the original has
//! two divergent framer implementations (blocking read loop vs. an
//! event-driven parser); this collapses both into the single
//! [`RspFramer::feed`] state machine below.

const ESCAPE: u8 = b'}';
const START: u8 = b'$';
const END: u8 = b'#';
const ESCAPE_XOR: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramerState {
	WaitForStart,
	ReadBody { escaped: bool },
	ChecksumHi,
	ChecksumLo { hi: u8 },
}

/// Outcome of feeding a byte to the framer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerEvent {
	/// A full packet was received and its checksum matched.
	Decoded(Vec<u8>),
	/// A full packet was received but its checksum did not match; the
	/// caller should send a NAK (`-`) and not act on the payload.
	ChecksumMismatch,
}

/// Incremental RSP packet parser. Feed it raw bytes off the wire one at a
/// time (or via [`RspFramer::feed_all`]); it emits a [`FramerEvent`] each
/// time a `$...#cc` frame completes.
pub struct RspFramer {
	state: FramerState,
	data: Vec<u8>,
	checksum: u8,
}

impl Default for RspFramer {
	fn default() -> Self {
		Self::new()
	}
}

impl RspFramer {
	pub fn new() -> Self {
		RspFramer {
			state: FramerState::WaitForStart,
			data: Vec::new(),
			checksum: 0,
		}
	}

	/// Feeds a single byte, returning an event if it completed a frame.
	pub fn feed(&mut self, byte: u8) -> Option<FramerEvent> {
		match self.state {
			FramerState::WaitForStart => {
				if byte == START {
					self.data.clear();
					self.checksum = 0;
					self.state = FramerState::ReadBody { escaped: false };
				}
				None
			}
			FramerState::ReadBody { escaped } => {
				if escaped {
					self.checksum = self.checksum.wrapping_add(byte);
					self.data.push(byte ^ ESCAPE_XOR);
					self.state = FramerState::ReadBody { escaped: false };
					None
				} else if byte == END {
					self.state = FramerState::ChecksumHi;
					None
				} else if byte == ESCAPE {
					self.checksum = self.checksum.wrapping_add(byte);
					self.state = FramerState::ReadBody { escaped: true };
					None
				} else {
					self.checksum = self.checksum.wrapping_add(byte);
					self.data.push(byte);
					None
				}
			}
			FramerState::ChecksumHi => match hex_digit(byte) {
				Some(hi) => {
					self.state = FramerState::ChecksumLo { hi };
					None
				}
				None => {
					self.state = FramerState::WaitForStart;
					Some(FramerEvent::ChecksumMismatch)
				}
			},
			FramerState::ChecksumLo { hi } => {
				self.state = FramerState::WaitForStart;
				match hex_digit(byte) {
					Some(lo) => {
						let received = (hi << 4) | lo;
						if received == self.checksum {
							Some(FramerEvent::Decoded(std::mem::take(&mut self.data)))
						} else {
							Some(FramerEvent::ChecksumMismatch)
						}
					}
					None => Some(FramerEvent::ChecksumMismatch),
				}
			}
		}
	}

	/// Feeds a whole buffer, collecting every event produced.
	pub fn feed_all(&mut self, bytes: &[u8]) -> Vec<FramerEvent> {
		bytes.iter().filter_map(|&b| self.feed(b)).collect()
	}
}

fn hex_digit(byte: u8) -> Option<u8> {
	match byte {
		b'0'..=b'9' => Some(byte - b'0'),
		b'a'..=b'f' => Some(byte - b'a' + 10),
		b'A'..=b'F' => Some(byte - b'A' + 10),
		_ => None,
	}
}

/// Wraps `payload` in a `$...#cc` frame, escaping `$`, `#` and `}` and
/// appending the two lowercase hex checksum digits.
pub fn encode(payload: &[u8]) -> Vec<u8> {
	let mut out = Vec::with_capacity(payload.len() + 4);
	out.push(START);
	let mut checksum: u8 = 0;
	for &b in payload {
		if b == START || b == END || b == ESCAPE {
			out.push(ESCAPE);
			checksum = checksum.wrapping_add(ESCAPE);
			let escaped = b ^ ESCAPE_XOR;
			out.push(escaped);
			checksum = checksum.wrapping_add(escaped);
		} else {
			out.push(b);
			checksum = checksum.wrapping_add(b);
		}
	}
	out.push(END);
	out.extend_from_slice(format!("{checksum:02x}").as_bytes());
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn decode_frame(body_and_checksum: &[u8]) -> Option<FramerEvent> {
		let mut framer = RspFramer::new();
		assert!(framer.feed(START).is_none());
		let mut last = None;
		for &b in body_and_checksum {
			if let Some(ev) = framer.feed(b) {
				last = Some(ev);
			}
		}
		last
	}

	#[test]
	fn decodes_simple_packet() {
		assert_eq!(decode_frame(b"swbreak#ef"), Some(FramerEvent::Decoded(b"swbreak".to_vec())));
	}

	#[test]
	fn decodes_escaped_packet() {
		assert_eq!(decode_frame(b"swbre}]ak#c9"), Some(FramerEvent::Decoded(b"swbre}ak".to_vec())));
	}

	#[test]
	fn rejects_bad_checksum() {
		assert_eq!(decode_frame(b"m23,4#a4"), Some(FramerEvent::ChecksumMismatch));
	}

	#[test]
	fn encode_matches_decode() {
		let frame = encode(b"swbreak");
		assert_eq!(frame, b"$swbreak#ef");
	}

	#[test]
	fn encode_escapes_special_bytes() {
		let frame = encode(b"swbre}ak");
		assert_eq!(frame, b"$swbre}]ak#c9");
	}

	#[test]
	fn framer_resets_after_garbage_before_start() {
		let mut framer = RspFramer::new();
		assert!(framer.feed(b'x').is_none());
		assert!(framer.feed(b'y').is_none());
		assert!(framer.feed(START).is_none());
		for &b in b"ok#9a" {
			framer.feed(b);
		}
	}
}
