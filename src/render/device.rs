use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::foundation::error::{ArError, ArResult};

/// Kind of GPU object a handle stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Output surface sized to the viewport.
    RenderTarget,
    /// Plane vertex data.
    Geometry,
    /// Unlit material.
    Material,
    /// Texture holding the live video frame.
    Texture,
}

/// Opaque handle to a device allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GpuHandle {
    id: u64,
    kind: ResourceKind,
}

impl GpuHandle {
    /// Allocation kind.
    pub fn kind(self) -> ResourceKind {
        self.kind
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    next_id: u64,
    live: BTreeMap<u64, (ResourceKind, usize)>,
    created: usize,
    released: usize,
}

/// Shared record of every live device allocation, so leaks are observable.
#[derive(Clone, Debug, Default)]
pub struct HandleLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl HandleLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn allocate(&self, kind: ResourceKind, bytes: usize) -> GpuHandle {
        let mut st = self.lock();
        st.next_id += 1;
        let id = st.next_id;
        st.live.insert(id, (kind, bytes));
        st.created += 1;
        GpuHandle { id, kind }
    }

    fn release(&self, handle: GpuHandle) -> bool {
        let mut st = self.lock();
        let removed = st.live.remove(&handle.id).is_some();
        if removed {
            st.released += 1;
        }
        removed
    }

    /// Handles allocated and not yet released.
    pub fn live(&self) -> usize {
        self.lock().live.len()
    }

    /// Live handles of one kind.
    pub fn live_of(&self, kind: ResourceKind) -> usize {
        self.lock().live.values().filter(|(k, _)| *k == kind).count()
    }

    /// Bytes held by live handles.
    pub fn live_bytes(&self) -> usize {
        self.lock().live.values().map(|(_, b)| b).sum()
    }

    /// Total allocations over the ledger's lifetime.
    pub fn created(&self) -> usize {
        self.lock().created
    }

    /// Total releases over the ledger's lifetime.
    pub fn released(&self) -> usize {
        self.lock().released
    }
}

/// What a device reported during its capability probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceCaps {
    /// Human-readable device name.
    pub name: String,
    /// Largest supported render target side.
    pub max_target_side: u32,
}

/// Render context the compositor draws through.
pub trait RenderDevice: Send {
    /// Check 3D rendering capability. Failures are `AR_UNSUPPORTED`.
    fn probe(&self) -> ArResult<DeviceCaps>;
    /// Allocate a tracked object.
    fn allocate(&mut self, kind: ResourceKind, bytes: usize) -> ArResult<GpuHandle>;
    /// Release a tracked object; `false` when it was already released.
    fn release(&mut self, handle: GpuHandle) -> bool;
    /// Ledger of live allocations.
    fn ledger(&self) -> &HandleLedger;
}

/// CPU rasterizing device. Always available unless built as [`SoftwareDevice::unavailable`].
#[derive(Clone, Debug)]
pub struct SoftwareDevice {
    ledger: HandleLedger,
    unavailable: Option<String>,
    max_target_side: u32,
}

impl Default for SoftwareDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareDevice {
    /// Working device with a fresh ledger.
    pub fn new() -> Self {
        Self {
            ledger: HandleLedger::new(),
            unavailable: None,
            max_target_side: u32::from(u16::MAX),
        }
    }

    /// Device whose probe fails, standing in for a platform without 3D acceleration.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::new()
        }
    }
}

impl RenderDevice for SoftwareDevice {
    fn probe(&self) -> ArResult<DeviceCaps> {
        if let Some(reason) = &self.unavailable {
            return Err(ArError::unsupported(reason.clone()));
        }
        Ok(DeviceCaps {
            name: "software".to_string(),
            max_target_side: self.max_target_side,
        })
    }

    fn allocate(&mut self, kind: ResourceKind, bytes: usize) -> ArResult<GpuHandle> {
        if let Some(reason) = &self.unavailable {
            return Err(ArError::unsupported(reason.clone()));
        }
        Ok(self.ledger.allocate(kind, bytes))
    }

    fn release(&mut self, handle: GpuHandle) -> bool {
        self.ledger.release(handle)
    }

    fn ledger(&self) -> &HandleLedger {
        &self.ledger
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/device.rs"]
mod tests;
