//! `(sub_device, pid) -> ParameterRecord` map, matching the original
//! `rdm_pd_*` surface: definitions, owned/aliased storage, a non-volatile
//! flag, and the queued-message depth contract.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;

use crate::error::{DmxError, DmxResult};

/// Command classes a PID supports, per its definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdCommandClass {
    DiscOnly,
    GetOnly,
    SetOnly,
    GetSet,
}

impl PdCommandClass {
    pub fn supports_get(self) -> bool {
        matches!(self, PdCommandClass::GetOnly | PdCommandClass::GetSet)
    }

    pub fn supports_set(self) -> bool {
        matches!(self, PdCommandClass::SetOnly | PdCommandClass::GetSet)
    }
}

/// Static metadata about a PID: allocation size, supported command classes,
/// and the format strings used to encode/decode its parameter data.
#[derive(Debug, Clone, Copy)]
pub struct PdDefinition {
    pub pid: u16,
    pub pid_cc: PdCommandClass,
    pub alloc_size: usize,
    pub get_format: &'static str,
    pub set_format: &'static str,
    pub description: &'static str,
}

/// Backing storage for a parameter record: either bytes owned by this
/// record, or an alias that reads through to another PID's storage at a
/// byte offset (mirrors `rdm_pd_add_alias`).
#[derive(Debug, Clone)]
pub enum Storage {
    Owned(Vec<u8>),
    Alias { pid: u16, offset: usize },
}

struct ParameterRecord {
    definition: PdDefinition,
    storage: Storage,
    non_volatile: bool,
}

/// Per-port `(sub_device, pid)` parameter storage plus the queued-message
/// size contract (§10.4). Storage *policy* (what gets queued, eviction
/// order) is out of scope; only the size contract is implemented here.
pub struct PdRegistry {
    records: BTreeMap<(u16, u16), ParameterRecord>,
    queue: VecDeque<u16>,
    queue_capacity: u8,
}

impl PdRegistry {
    pub fn new(queue_capacity: u8) -> Self {
        PdRegistry {
            records: BTreeMap::new(),
            queue: VecDeque::new(),
            queue_capacity,
        }
    }

    pub fn set_definition(&mut self, sub_device: u16, definition: PdDefinition) {
        self.records.entry((sub_device, definition.pid)).or_insert_with(|| ParameterRecord {
            definition,
            storage: Storage::Owned(alloc::vec![0u8; definition.alloc_size]),
            non_volatile: false,
        });
    }

    pub fn get_definition(&self, sub_device: u16, pid: u16) -> Option<&PdDefinition> {
        self.records.get(&(sub_device, pid)).map(|r| &r.definition)
    }

    /// All PIDs registered for `sub_device`, in ascending order (used to
    /// answer `SUPPORTED_PARAMETERS`).
    pub fn supported_pids(&self, sub_device: u16) -> impl Iterator<Item = u16> + '_ {
        self.records
            .range((sub_device, 0)..(sub_device, u16::MAX))
            .map(|(&(_, pid), _)| pid)
    }

    pub fn add_variable(&mut self, sub_device: u16, definition: PdDefinition, non_volatile: bool, init: &[u8]) {
        let mut bytes = alloc::vec![0u8; definition.alloc_size];
        let n = init.len().min(bytes.len());
        bytes[..n].copy_from_slice(&init[..n]);
        self.records.insert(
            (sub_device, definition.pid),
            ParameterRecord {
                definition,
                storage: Storage::Owned(bytes),
                non_volatile,
            },
        );
    }

    pub fn add_alias(&mut self, sub_device: u16, definition: PdDefinition, alias_pid: u16, offset: usize) {
        self.records.insert(
            (sub_device, definition.pid),
            ParameterRecord {
                definition,
                storage: Storage::Alias { pid: alias_pid, offset },
                non_volatile: false,
            },
        );
    }

    pub fn is_non_volatile(&self, sub_device: u16, pid: u16) -> bool {
        self.records.get(&(sub_device, pid)).map(|r| r.non_volatile).unwrap_or(false)
    }

    pub fn get(&self, sub_device: u16, pid: u16) -> DmxResult<&[u8]> {
        let record = self.records.get(&(sub_device, pid)).ok_or(DmxError::InvalidArgument)?;
        match &record.storage {
            Storage::Owned(bytes) => Ok(bytes),
            Storage::Alias { pid: alias_pid, offset } => {
                let aliased = self.records.get(&(sub_device, *alias_pid)).ok_or(DmxError::InvalidArgument)?;
                match &aliased.storage {
                    Storage::Owned(bytes) => Ok(&bytes[(*offset).min(bytes.len())..]),
                    Storage::Alias { .. } => Err(DmxError::InvalidArgument),
                }
            }
        }
    }

    pub fn set(&mut self, sub_device: u16, pid: u16, data: &[u8]) -> DmxResult<usize> {
        let record = self.records.get_mut(&(sub_device, pid)).ok_or(DmxError::InvalidArgument)?;
        match &mut record.storage {
            Storage::Owned(bytes) => {
                let n = data.len().min(bytes.len());
                bytes[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Storage::Alias { .. } => Err(DmxError::InvalidArgument),
        }
    }

    /// Sets a PID's value and appends it to the queued-message slot,
    /// mirroring `rdm_pd_set_and_queue`.
    pub fn set_and_queue(&mut self, sub_device: u16, pid: u16, data: &[u8]) -> DmxResult<usize> {
        let n = self.set(sub_device, pid, data)?;
        if (self.queue.len() as u8) < self.queue_capacity {
            self.queue.push_back(pid);
        }
        Ok(n)
    }

    pub fn queue_len(&self) -> u8 {
        self.queue.len() as u8
    }

    pub fn queue_capacity(&self) -> u8 {
        self.queue_capacity
    }

    pub fn queue_pop(&mut self) -> Option<u16> {
        self.queue.pop_front()
    }

    pub fn queue_peek_last(&self) -> Option<u16> {
        self.queue.back().copied()
    }
}
