//! Register addresses used by the module common descriptor, CL-SCM and
//! CL-CDM. Reconstructed from call-site evidence in
//! `examples/original_source/src/libosd/cl_scm.c` and
//! `examples/original_source/tests/unit/check_cl_cdm.c` — the upstream
//! `reg.h` did not survive the retrieval filter.

/// Module-type-specific registers start at this offset within a module's
/// register space; addresses below it are reserved for the `module`
/// registers common to every module, read by `describe_module`.
const BASE_MOD_SPECIFIC: u16 = 0x200;

/// Registers common to every module, read by `describe_module`.
pub mod module {
	pub const VENDOR_ID: u16 = 0x0;
	pub const TYPE_ID: u16 = 0x1;
	pub const VERSION: u16 = 0x2;
}

/// SCM registers.
pub mod scm {
	use super::BASE_MOD_SPECIFIC;

	pub const SYSTEM_VENDOR_ID: u16 = BASE_MOD_SPECIFIC;
	pub const SYSTEM_DEVICE_ID: u16 = BASE_MOD_SPECIFIC + 1;
	pub const MAX_PKT_LEN: u16 = BASE_MOD_SPECIFIC + 2;
	/// System reset register; bit 1 is the CPU reset bit (cleared to run,
	/// set to hold CPUs in reset).
	pub const SYSRST: u16 = BASE_MOD_SPECIFIC + 3;
	pub const SYSRST_CPU_RESET_BIT: u32 = 1;
}

/// CDM registers.
pub mod cdm {
	use super::BASE_MOD_SPECIFIC;

	pub const CORE_CTRL: u16 = BASE_MOD_SPECIFIC;
	pub const CORE_REG_UPPER: u16 = BASE_MOD_SPECIFIC + 1;
	pub const CORE_DATA_WIDTH: u16 = BASE_MOD_SPECIFIC + 2;

	/// `CORE_CTRL` bit 0: CPU stall, matching the stall-flag bit position
	/// already fixed by the EVENT payload convention (`cl_cdm::decode_event`).
	/// 1 = held in stall, 0 = running.
	pub const CORE_CTRL_STALL_BIT: u32 = 0;
	/// `CORE_CTRL` bit 1: single-step-and-restall.
	pub const CORE_CTRL_STEP_BIT: u32 = 1;
}
