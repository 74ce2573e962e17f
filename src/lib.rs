//! Zone replication for authoritative DNS servers.
//!
//! This crate provides the building blocks for keeping copies of a DNS zone
//! in sync between a primary and its secondaries via full (AXFR) and
//! incremental (IXFR) zone transfers.
//!
//! # Modules
//!
//! * [base] contains the DNS data types transfers are made of: serial
//!   numbers, domain names, resource records, and messages,
//! * [stream] defines the readable and writable octet streams transfers
//!   travel over together with a number of stream decorators,
//! * [zonetree] defines the interface to zone storage, provides an
//!   in-memory implementation, and allows persisting zones as snapshots,
//!   and
//! * [xfr] implements producing and consuming transfers on top of all
//!   that.
//!
//! # Reference of Feature Flags
//!
//! * `logging`: Enables the `logging` module providing a helper that sets
//!   up a [tracing-subscriber](https://github.com/tokio-rs/tracing)
//!   subscriber for the events logged by this crate.
//! * `serde`: Allows (de)serializing the configuration types using
//!   [serde](https://serde.rs/).
//! * `zlib`: Enables the compressing and decompressing stream decorators.
//!   This feature is enabled by default.

#![allow(renamed_and_removed_lints)]
#![allow(clippy::unknown_clippy_lints)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod base;
pub mod stream;
pub mod xfr;
pub mod zonetree;

#[cfg(any(test, feature = "logging"))]
pub mod logging;
