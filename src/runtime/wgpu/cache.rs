//! Process-wide client cache, one per adapter index

use super::client::WgpuClient;
use super::device::{WgpuDevice, WgpuError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::OnceLock;

static CLIENTS: OnceLock<Mutex<HashMap<usize, WgpuClient>>> = OnceLock::new();

/// Client for adapter `index`, opening the adapter on first use.
///
/// Pipelines built on the same adapter share its device and queue. A failed
/// open is not cached, so a later build retries it.
pub(super) fn client_for(index: usize) -> Result<WgpuClient, WgpuError> {
    let mut clients = CLIENTS.get_or_init(Default::default).lock();
    if let Some(client) = clients.get(&index) {
        return Ok(client.clone());
    }

    let client = WgpuClient::new_uncached(WgpuDevice::new(index))?;
    clients.insert(index, client.clone());
    Ok(client)
}
