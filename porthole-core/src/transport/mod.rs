//! Transport layer: dialing relay and local sockets, and the framed control
//! connection running on top of them.

pub mod framed;
pub mod socket_tuning;
pub mod tcp;

pub use framed::FramedConnection;
pub use tcp::connect;
