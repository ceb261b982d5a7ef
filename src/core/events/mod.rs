//! Business events
//!
//! - [`model`] - event names, property keys and the built event values
//! - [`builder`] - [`EventSpec`], [`EventBuilder`] and lineage resolution
//! - [`service`] - immediate and queued dispatch to the telemetry sink

pub mod builder;
pub mod model;
pub mod service;

pub use builder::{assemble, EventBuilder, EventSpec, ItemSpec, LineageContext};
pub use model::{
    BusinessEvent, EventProperty, ItemEventData, ReportEventData, ReportStreamEventName,
};
pub use service::{Delivery, EventService, PendingEvents};
