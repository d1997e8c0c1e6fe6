//! Byte-string <-> two-hex-digits-per-byte conversions, in the byte order
//! RSP expects (each byte of the input array maps to exactly one
//! lowercase hex pair, left to right — see the worked examples in
//! spec.md §8; despite the "little-endian to big-endian" framing in the
//! prose, the verified scenarios show a direct, non-reversing mapping).

use crate::error::{Error, Result};

/// Encodes `bytes` as a lowercase hex string, two digits per byte.
pub fn mem2hex(bytes: &[u8]) -> String {
	let mut out = String::with_capacity(bytes.len() * 2);
	for b in bytes {
		out.push_str(&format!("{b:02x}"));
	}
	out
}

/// Decodes a hex string into bytes; `hex` must have an even length and
/// contain only hex digits.
pub fn hex2mem(hex: &str) -> Result<Vec<u8>> {
	let bytes = hex.as_bytes();
	if bytes.len() % 2 != 0 {
		return Err(Error::Protocol(format!("hex string of odd length {}", bytes.len())));
	}
	bytes
		.chunks_exact(2)
		.map(|pair| {
			let s = std::str::from_utf8(pair).map_err(|_| Error::Protocol("non-ASCII hex digit".into()))?;
			u8::from_str_radix(s, 16).map_err(|_| Error::Protocol(format!("invalid hex byte {s:?}")))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mem2hex_examples() {
		assert_eq!(mem2hex(&[0x03, 0xaf]), "03af");
		assert_eq!(mem2hex(&[0x3f, 0xe0, 0x45]), "3fe045");
	}

	#[test]
	fn hex2mem_example() {
		assert_eq!(hex2mem("9f4a4034ef").unwrap(), vec![159, 74, 64, 52, 239]);
	}

	#[test]
	fn roundtrip() {
		let data = b"the quick brown fox";
		assert_eq!(hex2mem(&mem2hex(data)).unwrap(), data);
	}

	#[test]
	fn rejects_odd_length() {
		assert!(hex2mem("abc").is_err());
	}
}
