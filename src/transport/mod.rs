//! Device-facing transport.
//!
//! One TCP listener, one independently spawned task per accepted
//! connection. Tasks share no mutable state with each other; the only
//! cross-connection state is the credential cache behind the
//! [`crate::platform::PlatformGateway`] interface.

mod tcp;

pub use tcp::TcpServer;
