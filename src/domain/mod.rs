//! Domain layer: value types, the order state machine and the ports through
//! which the engine talks to its collaborators.

pub mod amount;
pub mod endpoint;
pub mod evidence;
pub mod method;
pub mod order;
pub mod ports;
