//! Built-in generic probes
//!
//! - `HttpProbe`: request an endpoint and check its status (and optionally body)
//! - `TcpProbe`: open a TCP connection
//! - `DnsProbe`: resolve a host name
//! - `FnProbe`: wrap an async closure
//!
//! Vendor-specific probes live with the applications that need them; they
//! only have to implement `check::Probe`.

pub mod dns;
pub mod func;
pub mod http;
pub mod tcp;

pub use dns::DnsProbe;
pub use func::{probe_fn, FnProbe};
pub use http::HttpProbe;
pub use tcp::TcpProbe;
