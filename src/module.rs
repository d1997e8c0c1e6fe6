//! Module identification: vendor/type IDs and the per-kind descriptors
//! returned by `describe_module`.

use std::fmt;

/// Standard module type IDs, recovered from the upstream
/// `OSD_MODULE_TYPE_STD_*` short/long name tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
	Scm,
	DemUart,
	Mam,
	Cdm,
	Stm,
	Ctm,
	Unknown(u16),
}

impl ModuleType {
	pub fn from_id(id: u16) -> Self {
		match id {
			0 => ModuleType::Scm,
			1 => ModuleType::DemUart,
			2 => ModuleType::Mam,
			3 => ModuleType::Cdm,
			4 => ModuleType::Stm,
			5 => ModuleType::Ctm,
			other => ModuleType::Unknown(other),
		}
	}

	pub fn short_name(self) -> &'static str {
		match self {
			ModuleType::Scm => "SCM",
			ModuleType::DemUart => "DEM_UART",
			ModuleType::Mam => "MAM",
			ModuleType::Cdm => "CDM",
			ModuleType::Stm => "STM",
			ModuleType::Ctm => "CTM",
			ModuleType::Unknown(_) => "UNKNOWN",
		}
	}
}

impl fmt::Display for ModuleType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.short_name())
	}
}

/// Common fields read from any module's VENDOR_ID/TYPE_ID/VERSION
/// registers during `describe_module`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleDescriptor {
	pub vendor_id: u16,
	pub type_id: u16,
	pub version: u16,
	pub di_addr: u16,
}

impl ModuleDescriptor {
	pub fn module_type(&self) -> ModuleType {
		ModuleType::from_id(self.type_id)
	}
}

/// CDM-specific fields, cached after `CL-CDM::get_desc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdmDescriptor {
	pub di_addr: u16,
	pub core_ctrl: u16,
	pub core_reg_upper: u16,
	pub core_data_width: u16,
}

/// The SCM's published identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubnetDescriptor {
	pub vendor_id: u16,
	pub device_id: u16,
	pub max_pkt_len: u16,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn type_roundtrip() {
		assert_eq!(ModuleType::from_id(3), ModuleType::Cdm);
		assert_eq!(ModuleType::from_id(3).short_name(), "CDM");
		assert!(matches!(ModuleType::from_id(99), ModuleType::Unknown(99)));
	}
}
