//! Fuzzy temperature control and telemetry lifecycle for a single
//! composting unit.
//!
//! The engine turns (current, target) temperatures into heater and exhaust
//! duty cycles; the telemetry side buffers samples, rotates them into
//! archived aggregates and sends a one-time maturation notice.

pub mod controller;
pub mod device;
pub mod error;
pub mod inference;
pub mod ingest;
pub mod membership;
pub mod notify;
pub mod params;
pub mod rotation;
pub mod rules;
pub mod store;
pub mod telemetry;

pub use controller::{ActuatorState, ControlService, Controller, TiePolicy};
pub use device::{DeviceService, DeviceState, DeviceStatus};
pub use error::{Error, ErrorKind, Result};
pub use inference::{Engine, FuzzyOutput};
pub use ingest::{Ingested, TelemetryService};
pub use notify::{
    DispatchPolicy, DispatchReport, MaturationDispatcher, Notice, NoticeTransport, Recipient,
    RecipientDirectory, StaticRecipients, MATURATION_THRESHOLD,
};
pub use params::{ControlParameters, ControlSettings};
pub use rotation::{Rotation, RotationManager, ROTATION_THRESHOLD};
pub use rules::{Rule, RuleBase};
pub use store::{ControlStore, DeviceStore, MemoryStore, TelemetryStore};
pub use telemetry::{AggregateRecord, Averages, NewSample, Phase, RealtimeSample};
