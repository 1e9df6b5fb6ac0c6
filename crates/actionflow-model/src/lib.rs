//! Actionflow Model
//!
//! This crate contains the serializable records exchanged with the remote
//! workflow store. Records (`*Record`) are what the store returns and carry
//! server-derived fields; payloads (`*Payload`) are the editable subset sent
//! back on create and update.
//!
//! Every response from the store is wrapped in an [`Envelope`]:
//!
//! ```json
//! { "success": true, "data": { "id": 7, "name": "nightly sync" } }
//! { "success": false, "message": "The name field is required." }
//! ```

mod action;
mod connection;
mod envelope;
mod ids;
mod trigger;
mod workflow;

pub use action::{ActionPayload, ActionRecord, ITERATION_ACTION_TYPE};
pub use connection::Connection;
pub use envelope::Envelope;
pub use ids::{ActionId, TriggerId, WorkflowId};
pub use trigger::{TriggerPayload, TriggerRecord};
pub use workflow::{WorkflowPayload, WorkflowQuery, WorkflowRecord};

/// Version of the wire contract these types describe.
pub const WIRE_VERSION: &str = "1";
