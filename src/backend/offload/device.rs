//! Offload device discovery and selection
//!
//! Adapter selection is strict: the requested index must fall inside the
//! enumerated adapter list. A bad index is a fatal setup error, never a
//! silent substitution of device 0.

use crate::error::{Error, Result};
use wgpu::Adapter;

/// Identifying information for one offload device
#[derive(Clone, Debug)]
pub(crate) struct AdapterDetails {
    /// Adapter name as reported by the platform
    pub name: String,
    /// Graphics/compute API backing the adapter
    pub backend: wgpu::Backend,
    /// Driver name and version string, possibly empty
    pub driver: String,
}

impl AdapterDetails {
    fn from_info(info: wgpu::AdapterInfo) -> Self {
        let driver = if info.driver_info.is_empty() {
            info.driver
        } else if info.driver.is_empty() {
            info.driver_info
        } else {
            format!("{} {}", info.driver, info.driver_info)
        };
        Self {
            name: info.name,
            backend: info.backend,
            driver,
        }
    }
}

/// Select the adapter at `index` from the enumerated list.
async fn query_adapter(index: usize) -> Result<(Adapter, AdapterDetails)> {
    let instance = wgpu::Instance::default();

    let adapters: Vec<_> = instance.enumerate_adapters(wgpu::Backends::all()).await;
    if adapters.is_empty() {
        return Err(Error::DeviceUnavailable { backend: "offload" });
    }
    if index >= adapters.len() {
        return Err(Error::InvalidDevice {
            index,
            count: adapters.len(),
        });
    }

    let mut adapters = adapters;
    let adapter = adapters.swap_remove(index);
    let details = AdapterDetails::from_info(adapter.get_info());
    log::debug!("offload device {index}: {} ({:?})", details.name, details.backend);
    Ok((adapter, details))
}

/// Blocking wrapper around [`query_adapter`].
pub(crate) fn query_adapter_blocking(index: usize) -> Result<(Adapter, AdapterDetails)> {
    pollster::block_on(query_adapter(index))
}

/// Enumerate details for every visible adapter, in index order.
pub(crate) fn enumerate_details() -> Vec<AdapterDetails> {
    pollster::block_on(async {
        let instance = wgpu::Instance::default();
        instance
            .enumerate_adapters(wgpu::Backends::all())
            .await
            .into_iter()
            .map(|a| AdapterDetails::from_info(a.get_info()))
            .collect()
    })
}

/// Check whether at least one offload device is usable on this system.
///
/// Used by tests and the driver to skip the offload backend gracefully on
/// hosts with no GPU.
pub fn is_offload_available() -> bool {
    query_adapter_blocking(0).is_ok()
}
