// src/map/registry.rs

//! Process-wide registry of map buffers.
//!
//! Upstream executors address a buffer by an opaque 64-bit id. The
//! registry stores only weak references: a buffer whose last strong
//! [`MapBufferRef`] is dropped becomes reclaimable and its id stops
//! resolving. The internal mutex covers the map alone; the per-buffer lock
//! inside [`MapBufferRef`] exists because safe Rust hands out mutable
//! access that way, not to make a buffer multi-writer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use log::debug;

use crate::map::map_buffer::{MapBuffer, MapBufferBuilder};
use crate::utils::error::{MapError, Result};

/// First id handed out; a readable sentinel so buffer ids stand out in
/// logs and test dumps.
pub const FIRST_BUFFER_ID: u64 = 100_000;

static NEXT_ID: AtomicU64 = AtomicU64::new(FIRST_BUFFER_ID);

type Registry = Mutex<HashMap<u64, Weak<Mutex<MapBuffer>>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

fn lock_registry() -> MutexGuard<'static, HashMap<u64, Weak<Mutex<MapBuffer>>>> {
    registry().lock().unwrap_or_else(PoisonError::into_inner)
}

/// Strong handle to a registered buffer. Cloning shares the same buffer;
/// dropping the last clone makes the registry entry reclaimable.
#[derive(Debug, Clone)]
pub struct MapBufferRef {
    id: u64,
    buffer: Arc<Mutex<MapBuffer>>,
}

impl MapBufferRef {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Exclusive access to the buffer. Buffers are single-owner by
    /// contract; the lock serialises accidental cross-thread use instead
    /// of corrupting state.
    pub fn lock(&self) -> MutexGuard<'_, MapBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Atomically allocates a fresh buffer id.
pub fn unique_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Idempotently materialises the buffer for `id`: an existing live buffer
/// is returned as-is, otherwise one is built from `builder`.
pub fn get_or_create(id: u64, builder: MapBufferBuilder) -> Result<MapBufferRef> {
    let mut map = lock_registry();
    if let Some(existing) = map.get(&id).and_then(Weak::upgrade) {
        return Ok(MapBufferRef {
            id,
            buffer: existing,
        });
    }
    let buffer = Arc::new(Mutex::new(builder.build()?));
    map.insert(id, Arc::downgrade(&buffer));
    debug!("registered map buffer {}", id);
    Ok(MapBufferRef { id, buffer })
}

/// Resolves an id to a live buffer. Unknown ids and ids whose buffer has
/// been reclaimed are `NotFound`; dead entries are pruned on the way.
pub fn get(id: u64) -> Result<MapBufferRef> {
    let mut map = lock_registry();
    match map.get(&id).and_then(Weak::upgrade) {
        Some(buffer) => Ok(MapBufferRef { id, buffer }),
        None => {
            map.remove(&id);
            Err(MapError::NotFound(format!("map buffer {} is not registered", id)))
        }
    }
}

/// Drops the registry entry for `id`. Existing strong handles keep the
/// buffer alive; only the id stops resolving.
pub fn remove(id: u64) -> bool {
    let removed = lock_registry().remove(&id).is_some();
    if removed {
        debug!("removed map buffer {}", id);
    }
    removed
}
