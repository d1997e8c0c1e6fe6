//! CL-MAM: client layer for the Memory Access Module.
//!
//! Target memory is accessed as 16-bit-addressable words through the same
//! register request/response mechanism as CDM registers; a burst transfer
//! of `len` bytes may take several DI packets but is atomic from the
//! caller's perspective: either all bytes transfer, or the call fails and
//! `out`/the target is left untouched.

use crate::error::Result;
use crate::hostmod::{HostModClient, HostmodFlags, RegSize};

/// Number of bytes moved per underlying register transaction. MAM target
/// memory is addressed and transferred in 16-bit-register-sized chunks.
const CHUNK_BYTES: usize = RegSize::Bits16.bytes();

/// Burst-reads `len` bytes from `addr` on the MAM at `mam_di_addr` into
/// `out` (`out.len() == len`).
pub fn read(hostmod: &HostModClient, mam_di_addr: u16, addr: u32, len: usize, out: &mut [u8], flags: HostmodFlags) -> Result<()> {
	assert_eq!(out.len(), len, "out buffer must be exactly len bytes");

	let mut staged = vec![0u8; len];
	for (i, chunk) in staged.chunks_mut(CHUNK_BYTES).enumerate() {
		let reg_addr = mam_reg_addr(addr, i);
		if chunk.len() == CHUNK_BYTES {
			hostmod.reg_read(chunk, mam_di_addr, reg_addr, RegSize::Bits16, flags)?;
		} else {
			let mut word = [0u8; CHUNK_BYTES];
			hostmod.reg_read(&mut word, mam_di_addr, reg_addr, RegSize::Bits16, flags)?;
			chunk.copy_from_slice(&word[..chunk.len()]);
		}
	}

	out.copy_from_slice(&staged);
	Ok(())
}

/// Burst-writes `in_bytes` to `addr` on the MAM at `mam_di_addr`.
pub fn write(hostmod: &HostModClient, mam_di_addr: u16, addr: u32, in_bytes: &[u8], flags: HostmodFlags) -> Result<()> {
	for (i, chunk) in in_bytes.chunks(CHUNK_BYTES).enumerate() {
		let reg_addr = mam_reg_addr(addr, i);
		if chunk.len() == CHUNK_BYTES {
			hostmod.reg_write(chunk, mam_di_addr, reg_addr, RegSize::Bits16, flags)?;
		} else {
			let mut word = [0u8; CHUNK_BYTES];
			word[..chunk.len()].copy_from_slice(chunk);
			hostmod.reg_write(&word, mam_di_addr, reg_addr, RegSize::Bits16, flags)?;
		}
	}
	Ok(())
}

fn mam_reg_addr(base: u32, chunk_index: usize) -> u16 {
	(base as u64 + (chunk_index * CHUNK_BYTES) as u64) as u16
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn chunking_covers_partial_final_chunk() {
		// 3 bytes => 2 chunks: one full 16-bit word, one partial byte.
		let chunks: Vec<_> = (0..3u8).collect::<Vec<_>>().chunks(CHUNK_BYTES).map(|c| c.len()).collect();
		assert_eq!(chunks, vec![2, 1]);
	}
}
