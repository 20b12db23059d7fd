//! Coordination event stream adapter.

pub mod connector;
pub mod hub;
pub mod protocol;

pub use connector::{Connection, Connector, TungsteniteConnector};
pub use hub::EventHub;
pub use protocol::{ControlFrame, ControlOp};
