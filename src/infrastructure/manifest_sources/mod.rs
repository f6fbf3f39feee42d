//! Concrete `ManifestSource` transports. The loader itself is
//! transport-agnostic; this module supplies the HTTP(S) adapter the CLI
//! wires up by default. Object-store/OCI transports are left for an
//! operator to add against the same trait.

pub mod http_source;

pub use http_source::HttpManifestSource;
