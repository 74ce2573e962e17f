//! Creating data in wire format.

use bytes::BytesMut;
use octseq::builder::{OctetsBuilder, Truncate};
use std::vec::Vec;

use super::name::Name;

//------------ Composer ------------------------------------------------------

/// An octets builder that DNS data can be composed into.
pub trait Composer:
    OctetsBuilder + AsRef<[u8]> + AsMut<[u8]> + Truncate
{
    /// Appends a domain name using name compression if supported.
    ///
    /// Domain name compression attempts to lower the size of a DNS message
    /// by avoiding to include repeated domain name suffixes. Instead of
    /// adding the full suffix, a pointer to the location of the previous
    /// occurence is added.
    ///
    /// The trait provides a default implementation which simply appends the
    /// name uncompressed.
    fn append_compressed_name(
        &mut self,
        name: &Name,
    ) -> Result<(), Self::AppendError> {
        name.compose(self)
    }
}

impl Composer for Vec<u8> {}

impl Composer for BytesMut {}

//------------ compose functions ---------------------------------------------

/// Appends a big-endian `u16`.
pub fn compose_u16<Target: OctetsBuilder + ?Sized>(
    target: &mut Target,
    value: u16,
) -> Result<(), Target::AppendError> {
    target.append_slice(&value.to_be_bytes())
}

/// Appends a big-endian `u32`.
pub fn compose_u32<Target: OctetsBuilder + ?Sized>(
    target: &mut Target,
    value: u32,
) -> Result<(), Target::AppendError> {
    target.append_slice(&value.to_be_bytes())
}
