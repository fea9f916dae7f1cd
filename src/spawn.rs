//! Browser executor for frame loads.
//!
//! Natively the host passes any `LocalSpawn` (usually a
//! `futures_executor::LocalPool` spawner). In the browser, loads go to the
//! JS microtask queue.

use futures_util::future::LocalFutureObj;
use futures_util::task::{LocalSpawn, SpawnError};

/// Spawns loads with `wasm_bindgen_futures::spawn_local`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WasmSpawner;

impl LocalSpawn for WasmSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        wasm_bindgen_futures::spawn_local(future);
        Ok(())
    }
}
