//! Debug Interconnect (DI) packet: a fixed-layout sequence of 16-bit words.
//!
//! The first three words are the header (`DEST`, `SRC`, `FLAGS`); the rest
//! is payload. Wire byte order is always big-endian; conversions to/from
//! host-native `u16` happen only at [`Packet::from_wire`]/[`Packet::to_wire`].

use std::fmt;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

const HEADER_WORDS: usize = 3;
const TYPE_SHIFT: u16 = 14;
const TYPE_MASK: u16 = 0x3;
const TYPE_SUB_SHIFT: u16 = 10;
const TYPE_SUB_MASK: u16 = 0xf;

/// The four packet kinds carried in `FLAGS`'s top two bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
	Reg,
	Plain,
	Event,
	Res,
}

impl PacketType {
	fn from_bits(bits: u16) -> Self {
		match bits {
			0 => PacketType::Reg,
			1 => PacketType::Plain,
			2 => PacketType::Event,
			_ => PacketType::Res,
		}
	}

	fn to_bits(self) -> u16 {
		match self {
			PacketType::Reg => 0,
			PacketType::Plain => 1,
			PacketType::Event => 2,
			PacketType::Res => 3,
		}
	}

	fn name(self) -> &'static str {
		match self {
			PacketType::Reg => "REG",
			PacketType::Plain => "PLAIN",
			PacketType::Event => "EVENT",
			PacketType::Res => "RES",
		}
	}
}

/// A Debug Interconnect packet: header triplet plus payload words.
///
/// Packets are exclusively owned by their producer until handed to the
/// transport or to a client-layer decoder; they are never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
	words: Vec<u16>,
}

impl Packet {
	/// Allocates a zero-filled packet with `payload_words` words of
	/// payload plus the three header words.
	pub fn new(payload_words: usize) -> Self {
		Packet {
			words: vec![0u16; HEADER_WORDS + payload_words],
		}
	}

	/// Sets the header fields. Each value must fit the bit width of its
	/// field; an over-range value is an invariant violation and returns
	/// [`Error::Protocol`].
	pub fn set_header(&mut self, dest: u16, src: u16, ty: PacketType, type_sub: u16) -> Result<()> {
		if type_sub & !TYPE_SUB_MASK != 0 {
			return Err(Error::Protocol(format!(
				"type_sub {type_sub:#x} does not fit {TYPE_SUB_MASK:#x}"
			)));
		}

		self.words[0] = dest;
		self.words[1] = src;
		self.words[2] = (ty.to_bits() & TYPE_MASK) << TYPE_SHIFT | (type_sub & TYPE_SUB_MASK) << TYPE_SUB_SHIFT;
		Ok(())
	}

	pub fn get_dest(&self) -> u16 {
		self.words[0]
	}

	pub fn get_src(&self) -> u16 {
		self.words[1]
	}

	pub fn get_type(&self) -> PacketType {
		PacketType::from_bits((self.words[2] >> TYPE_SHIFT) & TYPE_MASK)
	}

	pub fn get_type_sub(&self) -> u16 {
		(self.words[2] >> TYPE_SUB_SHIFT) & TYPE_SUB_MASK
	}

	/// The payload words, i.e. everything after the three header words.
	pub fn payload(&self) -> &[u16] {
		&self.words[HEADER_WORDS..]
	}

	pub fn payload_mut(&mut self) -> &mut [u16] {
		&mut self.words[HEADER_WORDS..]
	}

	/// All words, including the header.
	pub fn words(&self) -> &[u16] {
		&self.words
	}

	/// Constructs a packet from a contiguous big-endian byte frame, as
	/// received from the Host Controller transport. The length must be a
	/// positive even number of bytes and at least 6 (three header words).
	pub fn from_wire(bytes: &[u8]) -> Result<Self> {
		if bytes.is_empty() || bytes.len() % 2 != 0 || bytes.len() < HEADER_WORDS * 2 {
			return Err(Error::Protocol(format!(
				"DI packet frame of {} bytes is not a valid word sequence",
				bytes.len()
			)));
		}

		let words = bytes.chunks_exact(2).map(BigEndian::read_u16).collect();
		Ok(Packet { words })
	}

	/// Serializes the packet to a contiguous big-endian byte frame.
	pub fn to_wire(&self) -> Vec<u8> {
		let mut buf = vec![0u8; self.words.len() * 2];
		BigEndian::write_u16_into(&self.words, &mut buf);
		buf
	}
}

impl fmt::Display for Packet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "Packet of {} data words:", self.words.len())?;
		if self.words.len() >= HEADER_WORDS {
			writeln!(
				f,
				"DEST = {}, SRC = {}, TYPE = {} ({}), TYPE_SUB = {}",
				self.get_dest(),
				self.get_src(),
				self.get_type().to_bits(),
				self.get_type().name(),
				self.get_type_sub()
			)?;
		}
		writeln!(f, "Packet data (including header):")?;
		for word in &self.words {
			writeln!(f, "  {word:#06x}")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn header_extractparts() {
		let mut pkg = Packet::new(0);
		pkg.words[0] = 0xa5ab;
		pkg.words[1] = 0x1234;
		pkg.words[2] = 0x5557;

		assert_eq!(pkg.get_dest(), 0xa5ab);
		assert_eq!(pkg.get_src(), 0x1234);
		assert_eq!(pkg.get_type(), PacketType::Plain);
		assert_eq!(pkg.get_type_sub(), 0x5);
	}

	#[test]
	fn header_set() {
		let mut pkg = Packet::new(0);
		pkg.set_header(0x1ab, 0x157, PacketType::Plain, 0x5).unwrap();

		assert_eq!(pkg.get_dest(), 0x1ab);
		assert_eq!(pkg.get_src(), 0x157);
		assert_eq!(pkg.words[2], 0x5400);
	}

	#[test]
	fn set_header_rejects_oversized_type_sub() {
		let mut pkg = Packet::new(0);
		assert!(pkg.set_header(0, 0, PacketType::Reg, 0x10).is_err());
	}

	#[test]
	fn wire_roundtrip() {
		let mut pkg = Packet::new(2);
		pkg.set_header(1, 2, PacketType::Event, 3).unwrap();
		pkg.payload_mut()[0] = 0xdead;
		pkg.payload_mut()[1] = 0xbeef;

		let bytes = pkg.to_wire();
		assert_eq!(bytes.len(), 10);
		let back = Packet::from_wire(&bytes).unwrap();
		assert_eq!(back, pkg);
	}

	#[test]
	fn from_wire_rejects_short_frames() {
		assert!(Packet::from_wire(&[0, 1, 2, 3]).is_err());
		assert!(Packet::from_wire(&[0, 1, 2]).is_err());
	}
}
