//! Request-scoped identity shared between the server's ingress layer and the
//! gateway crate, independent of any particular transport.

mod client_identity;

pub use client_identity::ClientIdentity;
