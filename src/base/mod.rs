//! Basics.
//!
//! This module provides the DNS data types zone transfers are made of:
//! serial numbers and their comparison, domain names, resource records,
//! and the messages records travel in.
//!
//! Parsing happens from a [`ReadStream`] so that records can be taken
//! straight from a message or a file. Composing happens into an octets
//! builder implementing [`Composer`] which allows a message to compress
//! owner names while snapshot files and other plain targets don’t.
//!
//! [`ReadStream`]: crate::stream::ReadStream
//! [`Composer`]: wire::Composer

pub use self::iana::{Class, Opcode, Rcode, Rtype};
pub use self::message::{
    Header, HeaderCounts, MessageBuilder, MessageReader, PushError, Question,
    Section,
};
pub use self::name::{Name, NameError};
pub use self::record::{Record, RecordData, RecordError, Soa, UnknownData};
pub use self::serial::Serial;

pub mod iana;
pub mod message;
pub mod name;
pub mod record;
pub mod serial;
pub mod wire;
