//! Parameter-data registry: per-`(sub_device, pid)` storage, definitions,
//! and the queued-message size contract (§3, §10.4).

mod builtin;
mod persist;
mod registry;

pub use builtin::{
    install_builtin_parameters, DeviceInfo, DMX_START_ADDRESS_NONE, PID_DEVICE_INFO,
    PID_DMX_START_ADDRESS, PID_IDENTIFY_DEVICE, PID_SOFTWARE_VERSION_LABEL,
    PID_SUPPORTED_PARAMETERS,
};
pub use persist::{NoopPersist, PersistHook};
pub use registry::{PdCommandClass, PdDefinition, PdRegistry, Storage};
