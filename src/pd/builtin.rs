//! Default parameter definitions for the minimum-required PID set (§6).
//!
//! `DISC_UNIQUE_BRANCH`/`DISC_MUTE`/`DISC_UN_MUTE` carry no parameter data
//! storage of their own (discovery-class PIDs are control flow, not stored
//! values) and so are not registered here; their behavior lives in
//! `driver::responder`.

use crate::codec::{encode_pd, PdField};

use super::registry::{PdCommandClass, PdDefinition, PdRegistry};

pub const PID_SUPPORTED_PARAMETERS: u16 = 0x0050;
pub const PID_DEVICE_INFO: u16 = 0x0060;
pub const PID_SOFTWARE_VERSION_LABEL: u16 = 0x00c0;
pub const PID_DMX_START_ADDRESS: u16 = 0x00f0;
pub const PID_IDENTIFY_DEVICE: u16 = 0x1000;

/// Device-info fields a responder fills in at install time; stored as the
/// initial value of `DEVICE_INFO`'s owned bytes.
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    pub model_id: u16,
    pub product_category: u16,
    pub software_version_id: u32,
    pub footprint: u16,
    pub current_personality: u8,
    pub personality_count: u8,
    pub start_address: u16,
    pub sub_device_count: u16,
    pub sensor_count: u8,
}

impl DeviceInfo {
    /// Encodes against `DEVICE_INFO`'s own `get_format` ("wwwdwbbwwb") rather
    /// than hand-slicing the layout a second time; the leading `w` is the
    /// RDM protocol version (major.minor, fixed at 1.0).
    fn encode(self) -> [u8; 19] {
        let values = [
            PdField::U16(0x0001),
            PdField::U16(self.model_id),
            PdField::U16(self.product_category),
            PdField::U32(self.software_version_id),
            PdField::U16(self.footprint),
            PdField::U8(self.current_personality),
            PdField::U8(self.personality_count),
            PdField::U16(self.start_address),
            PdField::U16(self.sub_device_count),
            PdField::U8(self.sensor_count),
        ];
        let mut buf = [0u8; 19];
        let n = encode_pd("wwwdwbbwwb", &values, &mut buf).expect("DEVICE_INFO's own format string must encode its own fields");
        debug_assert_eq!(n, 19);
        buf
    }
}

/// DMX address meaning "this device has no footprint", per §6/types.h.
pub const DMX_START_ADDRESS_NONE: u16 = 0xffff;

/// Registers the minimum-required, non-discovery PID set for `sub_device`
/// (almost always the root device, `0`).
pub fn install_builtin_parameters(registry: &mut PdRegistry, sub_device: u16, device_info: DeviceInfo, software_version_label: &str) {
    registry.add_variable(
        sub_device,
        PdDefinition {
            pid: PID_DEVICE_INFO,
            pid_cc: PdCommandClass::GetOnly,
            alloc_size: 19,
            get_format: "wwwdwbbwwb",
            set_format: "",
            description: "DEVICE_INFO",
        },
        false,
        &device_info.encode(),
    );

    let label_bytes = software_version_label.as_bytes();
    registry.add_variable(
        sub_device,
        PdDefinition {
            pid: PID_SOFTWARE_VERSION_LABEL,
            pid_cc: PdCommandClass::GetOnly,
            alloc_size: label_bytes.len().min(32).max(1),
            get_format: "a",
            set_format: "",
            description: "SOFTWARE_VERSION_LABEL",
        },
        false,
        label_bytes,
    );

    registry.add_variable(
        sub_device,
        PdDefinition {
            pid: PID_DMX_START_ADDRESS,
            pid_cc: PdCommandClass::GetSet,
            alloc_size: 2,
            get_format: "w",
            set_format: "w",
            description: "DMX_START_ADDRESS",
        },
        true,
        &device_info.start_address.to_be_bytes(),
    );

    registry.add_variable(
        sub_device,
        PdDefinition {
            pid: PID_IDENTIFY_DEVICE,
            pid_cc: PdCommandClass::GetSet,
            alloc_size: 1,
            get_format: "b",
            set_format: "b",
            description: "IDENTIFY_DEVICE",
        },
        false,
        &[0],
    );
}
