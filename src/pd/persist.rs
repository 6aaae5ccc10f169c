//! The non-volatile persistence seam (§10.4): a responder ACKs a SET of a
//! non-volatile PID immediately, then writes the new value through on send
//! completion rather than blocking the reply on storage I/O.

/// Platform hook invoked once a non-volatile SET has been ACKed and sent.
/// An embedder with real non-volatile storage (flash, EEPROM, a config
/// file) implements this to flush `(sub_device, pid)`'s current value;
/// a host build with no such storage uses [`NoopPersist`].
pub trait PersistHook {
    /// Persists the current value of `sub_device`/`pid`. The value itself
    /// is already in the [`crate::pd::PdRegistry`]; this only needs to push
    /// it to non-volatile storage. `Err` is logged, never retried.
    fn persist(&self, sub_device: u16, pid: u16) -> Result<(), ()>;
}

/// The default hook: no non-volatile storage backs this responder, so a SET
/// only ever lives in the in-memory registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersist;

impl PersistHook for NoopPersist {
    fn persist(&self, _sub_device: u16, _pid: u16) -> Result<(), ()> {
        Ok(())
    }
}
