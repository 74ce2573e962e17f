//! Resource records.
//!
//! A [`Record`] is the unit of data moved by a zone transfer. Its wire
//! format is defined in section 3.2.1 of [RFC 1035]:
//!
//! ```text
//! owner name | type u16 | class u16 | ttl u32 | rdlength u16 | rdata
//! ```
//!
//! The record data of the types the transfer code needs to look into or
//! that contain domain names which may be compressed on the wire is
//! decoded by [`RecordData`]. Everything else, including all DNSSEC types,
//! travels through as opaque octets in [`UnknownData`].
//!
//! Records read from a stream are decompressed; records composed into an
//! octets builder only have their owner name compressed, if the builder
//! supports it.
//!
//! [RFC 1035]: https://tools.ietf.org/html/rfc1035

use bytes::Bytes;
use core::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::vec::Vec;

use super::iana::{Class, Rtype};
use super::name::Name;
use super::serial::Serial;
use super::wire::{compose_u16, compose_u32, Composer};
use crate::stream::{
    Limited, ReadStream, ReadStreamExt, StreamError, WriteStream,
    WriteStreamExt,
};

//------------ Record --------------------------------------------------------

/// A resource record.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Record {
    owner: Name,
    class: Class,
    ttl: u32,
    data: RecordData,
}

impl Record {
    pub fn new(owner: Name, class: Class, ttl: u32, data: RecordData) -> Self {
        Record {
            owner,
            class,
            ttl,
            data,
        }
    }

    pub fn owner(&self) -> &Name {
        &self.owner
    }

    pub fn rtype(&self) -> Rtype {
        self.data.rtype()
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn data(&self) -> &RecordData {
        &self.data
    }

    /// Returns the SOA record data if this is a SOA record.
    pub fn soa(&self) -> Option<&Soa> {
        match self.data {
            RecordData::Soa(ref soa) => Some(soa),
            _ => None,
        }
    }

    /// Returns whether the record and `other` are the same data.
    ///
    /// This compares owner, class, and record data but ignores the TTL.
    pub fn same_data(&self, other: &Record) -> bool {
        self.owner == other.owner
            && self.class == other.class
            && self.data == other.data
    }
}

/// # Parsing and Composing
///
impl Record {
    /// Reads a record from a stream.
    ///
    /// If the stream ends cleanly before the first octet of the record,
    /// returns [`StreamError::EndOfStream`] wrapped into
    /// [`RecordError::Stream`]. If it ends anywhere later, the error is
    /// [`StreamError::Truncated`].
    ///
    /// Compressed domain names are resolved if the stream provides the
    /// message consumed so far.
    pub fn read<R: ReadStream + ?Sized>(
        stream: &mut R,
    ) -> Result<Self, RecordError> {
        let owner = stream.read_name()?;
        let mut fixed = [0u8; 10];
        stream
            .read_exact(&mut fixed)
            .map_err(|err| err.into_truncated(fixed.len(), 0))?;
        let rtype = Rtype::from_int(u16::from_be_bytes([fixed[0], fixed[1]]));
        let class = Class::from_int(u16::from_be_bytes([fixed[2], fixed[3]]));
        let ttl =
            u32::from_be_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        let rdlen = u16::from_be_bytes([fixed[8], fixed[9]]);

        let mut rdata = Limited::new(&mut *stream, usize::from(rdlen));
        let data = match RecordData::read(rtype, &mut rdata) {
            Ok(data) => data,
            Err(StreamError::LimitExceeded) => {
                return Err(RecordError::RdataLength {
                    rtype,
                    declared: rdlen,
                })
            }
            Err(err) => {
                let read = usize::from(rdlen) - rdata.remaining();
                return Err(err.into_truncated(usize::from(rdlen), read).into());
            }
        };
        if rdata.remaining() != 0 {
            return Err(RecordError::RdataLength {
                rtype,
                declared: rdlen,
            });
        }
        Ok(Record::new(owner, class, ttl, data))
    }

    /// Writes the record uncompressed to a stream.
    pub fn write<W: WriteStream + ?Sized>(
        &self,
        stream: &mut W,
    ) -> Result<(), StreamError> {
        let mut buf = Vec::with_capacity(self.compose_len());
        octseq::builder::infallible(self.compose(&mut buf));
        stream.write_all(&buf)
    }

    /// Returns the length of the uncompressed wire format.
    pub fn compose_len(&self) -> usize {
        self.owner.len() + 10 + usize::from(self.data.compose_len())
    }

    /// Appends the record to an octets builder.
    ///
    /// The owner name is compressed if the target supports it.
    pub fn compose<Target: Composer + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        target.append_compressed_name(&self.owner)?;
        compose_u16(target, self.rtype().to_int())?;
        compose_u16(target, self.class.to_int())?;
        compose_u32(target, self.ttl)?;
        compose_u16(target, self.data.compose_len())?;
        self.data.compose(target)
    }
}

//--- Display

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.owner,
            self.ttl,
            self.class,
            self.rtype(),
            self.data
        )
    }
}

//------------ RecordData ----------------------------------------------------

/// The data of a resource record.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ns(Name),
    Cname(Name),
    Ptr(Name),
    Mx { preference: u16, exchange: Name },
    Soa(Soa),
    Unknown(UnknownData),
}

impl RecordData {
    pub fn rtype(&self) -> Rtype {
        match *self {
            RecordData::A(_) => Rtype::A,
            RecordData::Aaaa(_) => Rtype::AAAA,
            RecordData::Ns(_) => Rtype::NS,
            RecordData::Cname(_) => Rtype::CNAME,
            RecordData::Ptr(_) => Rtype::PTR,
            RecordData::Mx { .. } => Rtype::MX,
            RecordData::Soa(_) => Rtype::SOA,
            RecordData::Unknown(ref data) => data.rtype,
        }
    }

    /// Reads record data of the given type.
    ///
    /// The stream must be limited to the record data so that data that is
    /// shorter than its type requires results in
    /// [`StreamError::LimitExceeded`].
    fn read<R: ReadStream>(
        rtype: Rtype,
        rdata: &mut Limited<R>,
    ) -> Result<Self, StreamError> {
        Ok(match rtype {
            Rtype::A => {
                let mut addr = [0u8; 4];
                rdata.read_exact(&mut addr)?;
                RecordData::A(addr.into())
            }
            Rtype::AAAA => {
                let mut addr = [0u8; 16];
                rdata.read_exact(&mut addr)?;
                RecordData::Aaaa(addr.into())
            }
            Rtype::NS => RecordData::Ns(rdata.read_name()?),
            Rtype::CNAME => RecordData::Cname(rdata.read_name()?),
            Rtype::PTR => RecordData::Ptr(rdata.read_name()?),
            Rtype::MX => RecordData::Mx {
                preference: rdata.read_u16()?,
                exchange: rdata.read_name()?,
            },
            Rtype::SOA => RecordData::Soa(Soa::read(rdata)?),
            _ => {
                let len = rdata.remaining();
                RecordData::Unknown(UnknownData {
                    rtype,
                    data: rdata.read_octets(len)?,
                })
            }
        })
    }

    /// Returns the length of the uncompressed wire format.
    pub fn compose_len(&self) -> u16 {
        // All names are at most 255 octets and unknown data is checked
        // upon creation, so none of this can overflow.
        let len = match *self {
            RecordData::A(_) => 4,
            RecordData::Aaaa(_) => 16,
            RecordData::Ns(ref name)
            | RecordData::Cname(ref name)
            | RecordData::Ptr(ref name) => name.len(),
            RecordData::Mx { ref exchange, .. } => 2 + exchange.len(),
            RecordData::Soa(ref soa) => soa.compose_len(),
            RecordData::Unknown(ref data) => data.data.len(),
        };
        len as u16
    }

    /// Appends the uncompressed record data to an octets builder.
    pub fn compose<Target: Composer + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        match *self {
            RecordData::A(addr) => target.append_slice(&addr.octets()),
            RecordData::Aaaa(addr) => target.append_slice(&addr.octets()),
            RecordData::Ns(ref name)
            | RecordData::Cname(ref name)
            | RecordData::Ptr(ref name) => name.compose(target),
            RecordData::Mx {
                preference,
                ref exchange,
            } => {
                compose_u16(target, preference)?;
                exchange.compose(target)
            }
            RecordData::Soa(ref soa) => soa.compose(target),
            RecordData::Unknown(ref data) => target.append_slice(&data.data),
        }
    }
}

//--- From

impl From<Soa> for RecordData {
    fn from(soa: Soa) -> Self {
        RecordData::Soa(soa)
    }
}

impl From<Ipv4Addr> for RecordData {
    fn from(addr: Ipv4Addr) -> Self {
        RecordData::A(addr)
    }
}

impl From<Ipv6Addr> for RecordData {
    fn from(addr: Ipv6Addr) -> Self {
        RecordData::Aaaa(addr)
    }
}

//--- Display

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RecordData::A(addr) => addr.fmt(f),
            RecordData::Aaaa(addr) => addr.fmt(f),
            RecordData::Ns(ref name)
            | RecordData::Cname(ref name)
            | RecordData::Ptr(ref name) => name.fmt(f),
            RecordData::Mx {
                preference,
                ref exchange,
            } => write!(f, "{} {}", preference, exchange),
            RecordData::Soa(ref soa) => soa.fmt(f),
            RecordData::Unknown(ref data) => data.fmt(f),
        }
    }
}

//------------ Soa -----------------------------------------------------------

/// The record data of a SOA record.
///
/// The wire format is defined in section 3.3.13 of [RFC 1035]:
///
/// ```text
/// mname | rname | serial u32 | refresh u32 | retry u32 | expire u32 |
/// minimum u32
/// ```
///
/// [RFC 1035]: https://tools.ietf.org/html/rfc1035
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Soa {
    mname: Name,
    rname: Name,
    serial: Serial,
    refresh: u32,
    retry: u32,
    expire: u32,
    minimum: u32,
}

impl Soa {
    pub fn new(
        mname: Name,
        rname: Name,
        serial: Serial,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    ) -> Self {
        Soa {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        }
    }

    /// Returns a copy of the data with a different serial.
    #[must_use]
    pub fn with_serial(&self, serial: Serial) -> Self {
        Soa {
            serial,
            ..self.clone()
        }
    }

    /// The primary name server for the zone.
    pub fn mname(&self) -> &Name {
        &self.mname
    }

    /// The mailbox of the person responsible for this zone.
    pub fn rname(&self) -> &Name {
        &self.rname
    }

    /// The serial number of the original copy of the zone.
    pub fn serial(&self) -> Serial {
        self.serial
    }

    pub fn refresh(&self) -> u32 {
        self.refresh
    }

    pub fn retry(&self) -> u32 {
        self.retry
    }

    pub fn expire(&self) -> u32 {
        self.expire
    }

    /// The minimum TTL to be exported with any RR from this zone.
    pub fn minimum(&self) -> u32 {
        self.minimum
    }

    fn read<R: ReadStream + ?Sized>(stream: &mut R) -> Result<Self, StreamError> {
        Ok(Soa {
            mname: stream.read_name()?,
            rname: stream.read_name()?,
            serial: stream.read_u32()?.into(),
            refresh: stream.read_u32()?,
            retry: stream.read_u32()?,
            expire: stream.read_u32()?,
            minimum: stream.read_u32()?,
        })
    }

    fn compose_len(&self) -> usize {
        self.mname.len() + self.rname.len() + 20
    }

    fn compose<Target: Composer + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        self.mname.compose(target)?;
        self.rname.compose(target)?;
        compose_u32(target, self.serial.into_int())?;
        compose_u32(target, self.refresh)?;
        compose_u32(target, self.retry)?;
        compose_u32(target, self.expire)?;
        compose_u32(target, self.minimum)
    }
}

impl fmt::Display for Soa {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.mname,
            self.rname,
            self.serial,
            self.refresh,
            self.retry,
            self.expire,
            self.minimum
        )
    }
}

//------------ UnknownData ---------------------------------------------------

/// Record data carried as opaque octets.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct UnknownData {
    rtype: Rtype,
    data: Bytes,
}

impl UnknownData {
    /// Creates opaque record data.
    ///
    /// Fails if the data is longer than 65,535 octets.
    pub fn new(
        rtype: Rtype,
        data: impl Into<Bytes>,
    ) -> Result<Self, RecordError> {
        let data = data.into();
        if data.len() > usize::from(u16::MAX) {
            return Err(RecordError::LongRdata);
        }
        Ok(UnknownData { rtype, data })
    }

    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}

//--- Display

impl fmt::Display for UnknownData {
    /// Formats the data in the generic format of RFC 3597.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\\# {}", self.data.len())?;
        if !self.data.is_empty() {
            f.write_str(" ")?;
            for ch in self.data.iter() {
                write!(f, "{:02x}", ch)?;
            }
        }
        Ok(())
    }
}

//------------ RecordError ---------------------------------------------------

/// A record could not be read or created.
#[derive(Debug)]
pub enum RecordError {
    /// Reading from the stream failed.
    Stream(StreamError),

    /// The record data did not match its declared length.
    RdataLength { rtype: Rtype, declared: u16 },

    /// Record data was longer than 65,535 octets.
    LongRdata,
}

impl RecordError {
    /// Returns whether the stream ended cleanly before the record.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, RecordError::Stream(StreamError::EndOfStream))
    }
}

impl From<StreamError> for RecordError {
    fn from(err: StreamError) -> Self {
        RecordError::Stream(err)
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RecordError::Stream(err) => err.fmt(f),
            RecordError::RdataLength { rtype, declared } => write!(
                f,
                "{} record data does not match its length of {}",
                rtype, declared
            ),
            RecordError::LongRdata => f.write_str("record data too long"),
        }
    }
}

impl std::error::Error for RecordError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordError::Stream(err) => Some(err),
            _ => None,
        }
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::stream::{MemoryReader, MemoryWriter};
    use core::str::FromStr;

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    fn soa_record(serial: u32) -> Record {
        Record::new(
            name("example."),
            Class::IN,
            3600,
            Soa::new(
                name("ns.example."),
                name("hostmaster.example."),
                Serial(serial),
                7200,
                3600,
                1209600,
                300,
            )
            .into(),
        )
    }

    #[test]
    fn soa_wire_format() {
        let mut buf = Vec::new();
        octseq::builder::infallible(soa_record(8).compose(&mut buf));
        let expected_rdlen = 12 + 20 + 20;
        assert_eq!(buf.len(), 9 + 10 + expected_rdlen);
        assert_eq!(&buf[9..11], &[0, 6]);
        assert_eq!(&buf[11..13], &[0, 1]);
        assert_eq!(&buf[13..17], &3600u32.to_be_bytes());
        assert_eq!(&buf[17..19], &(expected_rdlen as u16).to_be_bytes());
        // Serial follows the two names.
        assert_eq!(&buf[19 + 32..19 + 36], &8u32.to_be_bytes());
    }

    #[test]
    fn read_what_was_written() {
        let records = [
            soa_record(8),
            Record::new(
                name("a.example."),
                Class::IN,
                300,
                Ipv4Addr::new(1, 2, 3, 4).into(),
            ),
            Record::new(
                name("mail.example."),
                Class::IN,
                300,
                RecordData::Mx {
                    preference: 10,
                    exchange: name("mx.example."),
                },
            ),
            Record::new(
                name("example."),
                Class::IN,
                300,
                RecordData::Unknown(
                    UnknownData::new(Rtype::DNSKEY, &b"\x01\x01\x03\x08"[..])
                        .unwrap(),
                ),
            ),
        ];
        let mut out = MemoryWriter::new();
        for record in &records {
            record.write(&mut out).unwrap();
        }
        let mut input = MemoryReader::new(out.into_bytes());
        for record in &records {
            assert_eq!(&Record::read(&mut input).unwrap(), record);
        }
        assert!(Record::read(&mut input).unwrap_err().is_end_of_stream());
    }

    #[test]
    fn compressed_rdata_names() {
        // ns.example. at 0, then an NS record for example. pointing into
        // it.
        let mut wire = Vec::new();
        wire.extend_from_slice(b"\x02ns\x07example\x00");
        wire.extend_from_slice(b"\xC0\x03\x00\x02\x00\x01\x00\x00\x0e\x10");
        wire.extend_from_slice(b"\x00\x02\xC0\x00");
        let mut input = MemoryReader::new(wire);
        input.skip_exact(12).unwrap();
        let record = Record::read(&mut input).unwrap();
        assert_eq!(record.owner(), &name("example."));
        assert_eq!(record.data(), &RecordData::Ns(name("ns.example.")));
    }

    #[test]
    fn rdata_length_mismatch() {
        // An A record claiming five octets of data.
        let wire = b"\x00\x00\x01\x00\x01\x00\x00\x00\x00\x00\x05\x01\x02\x03\x04\x05";
        let err = Record::read(&mut MemoryReader::new(&wire[..])).unwrap_err();
        assert!(matches!(err, RecordError::RdataLength { declared: 5, .. }));

        // An A record claiming three octets of data.
        let wire = b"\x00\x00\x01\x00\x01\x00\x00\x00\x00\x00\x03\x01\x02\x03";
        let err = Record::read(&mut MemoryReader::new(&wire[..])).unwrap_err();
        assert!(matches!(err, RecordError::RdataLength { declared: 3, .. }));
    }

    #[test]
    fn truncated_record() {
        let mut buf = Vec::new();
        octseq::builder::infallible(soa_record(8).compose(&mut buf));
        for len in [1, 9, 12, 19, 30, buf.len() - 1] {
            let err = Record::read(&mut MemoryReader::new(buf[..len].to_vec()))
                .unwrap_err();
            assert!(
                matches!(err, RecordError::Stream(StreamError::Truncated { .. })),
                "length {}: {:?}",
                len,
                err
            );
        }
    }

    #[test]
    fn display() {
        assert_eq!(
            soa_record(8).to_string(),
            "example. 3600 IN SOA ns.example. hostmaster.example. 8 7200 \
             3600 1209600 300"
        );
        let data = UnknownData::new(Rtype::from_int(65280), &b"\xab\x01"[..])
            .unwrap();
        assert_eq!(data.to_string(), "\\# 2 ab01");
        assert!(matches!(
            UnknownData::new(Rtype::TXT, vec![0u8; 65536]),
            Err(RecordError::LongRdata)
        ));
    }
}
