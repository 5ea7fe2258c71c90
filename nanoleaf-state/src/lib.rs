//! Device state synchronisation for Nanoleaf controllers
//!
//! Turns what a controller reports into a minimal set of writes against a
//! [`state_store::StateStore`], and owns the description of the object tree
//! those writes land in.
//!
//! # Architecture
//!
//! ```text
//! GET /api/v1/{token}/ ─── DeviceInfo ───┐
//!                                         ├──► StateSynchronizer ──► StateStore
//! GET events?id=1,3,4 ─ StreamPayload ────┘         │
//!                          │                        ├── set_changed_state (compare, then write ack)
//!                          └── decoder::Delta ──────┘   effect list + rhythm provisioning
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use nanoleaf_state::{DeviceProfile, StateSynchronizer};
//! use state_store::StateStore;
//!
//! let info = client.get_info().await?;
//! let profile = DeviceProfile::resolve(&info.model);
//!
//! let sync = StateSynchronizer::new(StateStore::new(), profile);
//! sync.provision(&info);
//! let report = sync.apply_snapshot(&info);
//! println!("{} states written", report.written.len());
//! ```

pub mod attribute;
pub mod decoder;
pub mod error;
pub mod objects;
pub mod profile;
pub mod synchronizer;

pub use attribute::{Attribute, RHYTHM_DEVICE};
pub use decoder::{decode_payload, json_to_value, Delta};
pub use error::{Result, SyncError};
pub use profile::{compare_firmware, service_types, DeviceProfile};
pub use synchronizer::{RhythmTransition, StateSynchronizer, SyncReport, HUE_SATURATION_MODE};
