//! On-demand device search and pairing

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use nanoleaf_api::OpenApiClient;
use nanoleaf_discovery::{search, DiscoveredDevice, DiscoveryError, SearchOptions};

use crate::error::{AdapterError, Result};

/// Search options covering every known controller model
pub fn search_options(window: Duration, interface: Ipv4Addr) -> SearchOptions {
    SearchOptions::default()
        .with_window(window)
        .with_service_types(nanoleaf_state::service_types())
        .with_bind_addr(SocketAddr::V4(SocketAddrV4::new(interface, 0)))
}

/// Run one search without blocking the runtime
///
/// The result only arrives after the full search window has elapsed.
pub async fn search_devices(window: Duration, interface: Ipv4Addr) -> Result<Vec<DiscoveredDevice>> {
    let options = search_options(window, interface);
    tracing::debug!("Searching for nanoleaf devices for {} ms", window.as_millis());

    let devices = tokio::task::spawn_blocking(move || search(&options))
        .await
        .map_err(|e| DiscoveryError::NetworkError(format!("search task failed: {}", e)))??;

    tracing::info!("Found {} nanoleaf device(s)", devices.len());
    for device in &devices {
        tracing::debug!("{} at {}:{}", device.name, device.host, device.port);
    }
    Ok(devices)
}

/// Obtain an authorization token from a controller in pairing mode
///
/// The power button has to be held until the LEDs flash before calling this.
pub async fn pair(host: &str, port: u16, timeout: Duration) -> Result<String> {
    match OpenApiClient::request_auth_token(host, port, timeout).await {
        Ok(token) => {
            tracing::info!("Got new authorization token from '{}:{}'", host, port);
            Ok(token)
        }
        Err(e) if e.is_permission_denied() => Err(AdapterError::Authorization(format!(
            "{}, Device is not in pairing mode. Hold the power button for 5-7 seconds first!",
            e.format_error()
        ))),
        Err(e) => Err(e.into()),
    }
}
