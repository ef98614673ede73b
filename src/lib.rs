//! # VCU Module Emulator
//!
//! Reproduces the CAN wire behaviour of factory electronic modules so a
//! replacement vehicle control unit can run on an existing bus without the
//! original module fitted.
//!
//! ## Modules
//!
//! - **Gear shifter** (JLR Gen 1): lever decode and the rolling-code gear
//!   status stream the gateway requires
//! - **Battery monitor** (SimpBMS): telemetry with a freshness timeout that
//!   gates charge permission
//! - **Instrument cluster** (BMW E31), **inverter** (OpenInverter) and
//!   **charger** relays
//!
//! ## Quick Start
//!
//! ```rust
//! use vcuemu::{FrameRecorder, ParamTable, VcuConfig, VcuHost};
//! use vcuemu::modules::{GearShifter, GearState};
//!
//! let config = VcuConfig::default();
//! let mut params = ParamTable::new();
//! config.apply(&mut params);
//!
//! let registry = config.build_registry().unwrap();
//! let mut host = VcuHost::new(FrameRecorder::new(), params, registry);
//! host.start().unwrap();
//!
//! // One second of 1/10/100 ms ticks
//! host.advance(1000);
//!
//! let shifter = host.module::<GearShifter>().unwrap();
//! assert_eq!(shifter.get_gear(), GearState::Neutral);
//! ```
//!
//! ## Architecture
//!
//! - [`frame`] - bounded 8 byte bus frames
//! - [`bus`] - transport seam and in-memory recorder
//! - [`params`] - named parameter store seam
//! - [`modules`] - the module contract, registry and emulated modules
//! - [`scheduler`] - 1/10/100 ms cadence source
//! - [`host`] - orchestrator serialising frames and ticks
//! - [`config`] - JSON configuration

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]

extern crate alloc;

pub mod bus;
pub mod config;
pub mod error;
pub mod frame;
pub mod host;
pub mod modules;
pub mod params;
pub mod scheduler;

// Re-export main public types for convenience
pub use bus::{BusTransport, FrameRecorder};
pub use config::VcuConfig;
pub use error::{VcuError, VcuResult};
pub use frame::Frame;
pub use host::VcuHost;
pub use modules::{Module, ModuleContext, ModuleRegistry};
pub use params::{OpMode, ParamId, ParamStore, ParamTable};
