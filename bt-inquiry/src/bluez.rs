//! BlueZ-backed discovery primitive.
//!
//! Wraps the async `bluer` API in a current-thread tokio runtime so the
//! discovery loop can call it as a plain blocking function.

use std::collections::HashSet;

use bluer::{Adapter, AdapterEvent, Address, DiscoveryFilter, DiscoveryTransport, Session};
use futures::{pin_mut, StreamExt};
use tokio::runtime::Runtime;

use probehound::discovery::{Discoverer, InquiryParams};
use probehound::scanner::DevicePair;
use probehound::{Error, Result};

pub struct BluezDiscoverer {
    runtime: Runtime,
    // Keeps the D-Bus connection alive for the adapter handle.
    _session: Session,
    adapter: Adapter,
}

impl BluezDiscoverer {
    /// Connect to bluetoothd and power on the default adapter.
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (session, adapter) = runtime.block_on(async {
            let session = Session::new().await?;
            let adapter = session.default_adapter().await?;
            adapter.set_powered(true).await?;
            adapter
                .set_discovery_filter(DiscoveryFilter {
                    transport: DiscoveryTransport::BrEdr,
                    ..Default::default()
                })
                .await?;
            Ok::<_, bluer::Error>((session, adapter))
        })
        .map_err(Error::discovery)?;

        log::info!("Using Bluetooth adapter {}", adapter.name());
        Ok(Self {
            runtime,
            _session: session,
            adapter,
        })
    }
}

impl Discoverer for BluezDiscoverer {
    fn discover(&mut self, params: &InquiryParams) -> Result<Vec<DevicePair>> {
        let adapter = &self.adapter;
        self.runtime
            .block_on(inquiry(adapter, params))
            .map_err(Error::discovery)
    }
}

async fn inquiry(adapter: &Adapter, params: &InquiryParams) -> bluer::Result<Vec<DevicePair>> {
    let mut seen: Vec<Address> = Vec::new();
    let mut known: HashSet<Address> = HashSet::new();

    {
        let events = adapter.discover_devices().await?;
        pin_mut!(events);
        let deadline = tokio::time::sleep(params.duration);
        pin_mut!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.next() => match event {
                    Some(AdapterEvent::DeviceAdded(addr)) => {
                        if known.insert(addr) {
                            seen.push(addr);
                        }
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }
        // Dropping the event stream stops discovery.
    }

    let mut devices = Vec::with_capacity(seen.len());
    for addr in seen {
        let device = adapter.device(addr)?;
        if !keep_device(device.rssi().await?, params.flush_cache) {
            log::debug!("Skipping cached device {}", addr);
            continue;
        }

        let name = if params.lookup_names {
            device.name().await?.map(String::into_bytes)
        } else {
            None
        };
        let mut pair = DevicePair {
            address: addr.to_string(),
            name,
            class: None,
        };
        if params.lookup_class {
            if let Some(class) = device.class().await? {
                pair = pair.with_class(class);
            }
        }
        devices.push(pair);
    }
    Ok(devices)
}

/// BlueZ reports devices it merely remembers as well as ones heard now; only
/// the latter carry an RSSI.
fn keep_device(rssi: Option<i16>, flush_cache: bool) -> bool {
    !flush_cache || rssi.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_cache_drops_devices_without_rssi() {
        assert!(keep_device(Some(-60), true));
        assert!(!keep_device(None, true));
    }

    #[test]
    fn cached_devices_kept_without_flush() {
        assert!(keep_device(None, false));
        assert!(keep_device(Some(-60), false));
    }
}
