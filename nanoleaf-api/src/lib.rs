//! Nanoleaf OpenAPI client
//!
//! Typed access to a controller's REST API (`/api/v1/{token}`) and its
//! server-sent event stream, plus the colour conversions the API needs.
//!
//! ```no_run
//! use nanoleaf_api::{DeviceApi, OpenApiClient, DEFAULT_PORT, DEFAULT_TIMEOUT};
//!
//! # async fn example() -> nanoleaf_api::Result<()> {
//! let client = OpenApiClient::new("192.168.1.40", DEFAULT_PORT, "token", DEFAULT_TIMEOUT)?;
//! let info = client.get_info().await?;
//! println!("{} ({}) firmware {}", info.name, info.model, info.firmware_version);
//! client.set_brightness(40, 2).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod color;
pub mod error;
pub mod events;
pub mod info;
pub mod stream;

pub use client::{DeviceApi, OpenApiClient, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use color::{hsv_to_rgb, hsv_to_rgb_hex, ColorError, Hsv, Rgb};
pub use error::{reason_phrase, ApiError, Result};
pub use events::{effects_attr, state_attr, EventDomain, RawEvent, SseDecoder, SseMessage, StreamPayload};
pub use info::{DeviceInfo, EffectsInfo, Level, LightState, RhythmInfo, Switch};
pub use stream::{deliver_chunk, EventCallback, EventStreamHandle};
