//! DNS messages as far as zone transfers need them.
//!
//! This module provides the envelope transfers travel in: the message
//! header, the question, and the record sections. A [`MessageBuilder`]
//! assembles a message with owner name compression, a [`MessageReader`]
//! takes a received message apart record by record.
//!
//! Over TCP, every message is preceded by its length as a 16 bit value.
//! The functions [`read_framed`] and [`write_framed`] deal with that
//! framing.

use bytes::Bytes;
use core::{convert::Infallible, fmt};
use octseq::builder::{OctetsBuilder, ShortBuf, Truncate};
use octseq::parse::Parser;
use std::collections::HashMap;
use std::vec::Vec;

use super::iana::{Class, Opcode, Rcode, Rtype};
use super::name::Name;
use super::record::{Record, RecordError};
use super::wire::{compose_u16, Composer};
use crate::stream::{
    MemoryReader, ReadStream, ReadStreamExt, StreamError, WriteStream,
    WriteStreamExt,
};

/// The maximum size of a DNS message.
pub const MAX_MESSAGE_LEN: usize = 0xFFFF;

/// The size of the message header.
pub const HEADER_LEN: usize = 12;

//------------ Header --------------------------------------------------------

/// The first four octets of the message header.
///
/// The data is kept in wire format:
///
/// ```text
///                                 1  1  1  1  1  1
///   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      ID                       |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA|Z |AD|CD|   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Header {
    inner: [u8; 4],
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the header of a response to a message with this header.
    ///
    /// The ID, opcode, and RD flag are copied, the QR flag is set.
    #[must_use]
    pub fn response(self) -> Self {
        let mut res = Header::new();
        res.set_id(self.id());
        res.set_opcode(self.opcode());
        res.set_rd(self.rd());
        res.set_qr(true);
        res
    }

    pub fn id(self) -> u16 {
        u16::from_be_bytes([self.inner[0], self.inner[1]])
    }

    pub fn set_id(&mut self, id: u16) {
        self.inner[..2].copy_from_slice(&id.to_be_bytes())
    }

    /// Returns whether the message is a response.
    pub fn qr(self) -> bool {
        self.get_bit(2, 7)
    }

    pub fn set_qr(&mut self, set: bool) {
        self.set_bit(2, 7, set)
    }

    pub fn opcode(self) -> Opcode {
        Opcode::from_int((self.inner[2] >> 3) & 0x0F)
    }

    pub fn set_opcode(&mut self, opcode: Opcode) {
        self.inner[2] = self.inner[2] & 0x87 | ((opcode.to_int() & 0x0F) << 3);
    }

    /// Returns whether the answer is authoritative.
    pub fn aa(self) -> bool {
        self.get_bit(2, 2)
    }

    pub fn set_aa(&mut self, set: bool) {
        self.set_bit(2, 2, set)
    }

    /// Returns whether the message was truncated.
    pub fn tc(self) -> bool {
        self.get_bit(2, 1)
    }

    pub fn set_tc(&mut self, set: bool) {
        self.set_bit(2, 1, set)
    }

    pub fn rd(self) -> bool {
        self.get_bit(2, 0)
    }

    pub fn set_rd(&mut self, set: bool) {
        self.set_bit(2, 0, set)
    }

    pub fn rcode(self) -> Rcode {
        Rcode::from_int(self.inner[3] & 0x0F)
    }

    pub fn set_rcode(&mut self, rcode: Rcode) {
        self.inner[3] = self.inner[3] & 0xF0 | (rcode.to_int() & 0x0F);
    }

    fn get_bit(self, offset: usize, bit: usize) -> bool {
        self.inner[offset] & (1 << bit) != 0
    }

    fn set_bit(&mut self, offset: usize, bit: usize, set: bool) {
        if set {
            self.inner[offset] |= 1 << bit
        } else {
            self.inner[offset] &= !(1 << bit)
        }
    }
}

//------------ HeaderCounts --------------------------------------------------

/// The record counts of the four message sections.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HeaderCounts {
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl HeaderCounts {
    fn get(&self, section: Section) -> u16 {
        match section {
            Section::Question => self.qdcount,
            Section::Answer => self.ancount,
            Section::Authority => self.nscount,
            Section::Additional => self.arcount,
        }
    }

    fn get_mut(&mut self, section: Section) -> &mut u16 {
        match section {
            Section::Question => &mut self.qdcount,
            Section::Answer => &mut self.ancount,
            Section::Authority => &mut self.nscount,
            Section::Additional => &mut self.arcount,
        }
    }
}

//------------ HeaderSection -------------------------------------------------

/// The complete twelve octet message header.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HeaderSection {
    pub header: Header,
    pub counts: HeaderCounts,
}

impl HeaderSection {
    /// Parses the header section from the start of a message.
    pub fn parse(message: &[u8]) -> Result<Self, StreamError> {
        let mut parser = Parser::from_ref(message);
        let short = |_| StreamError::Truncated {
            expected: HEADER_LEN,
            read: message.len(),
        };
        let mut header = Header::new();
        parser.parse_buf(&mut header.inner).map_err(short)?;
        let counts = HeaderCounts {
            qdcount: parser.parse_u16_be().map_err(short)?,
            ancount: parser.parse_u16_be().map_err(short)?,
            nscount: parser.parse_u16_be().map_err(short)?,
            arcount: parser.parse_u16_be().map_err(short)?,
        };
        Ok(HeaderSection { header, counts })
    }

    fn compose_into(&self, target: &mut [u8]) {
        target[..4].copy_from_slice(&self.header.inner);
        target[4..6].copy_from_slice(&self.counts.qdcount.to_be_bytes());
        target[6..8].copy_from_slice(&self.counts.ancount.to_be_bytes());
        target[8..10].copy_from_slice(&self.counts.nscount.to_be_bytes());
        target[10..12].copy_from_slice(&self.counts.arcount.to_be_bytes());
    }
}

//------------ Question ------------------------------------------------------

/// A question of a DNS message.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Question {
    qname: Name,
    qtype: Rtype,
    qclass: Class,
}

impl Question {
    pub fn new(qname: Name, qtype: Rtype, qclass: Class) -> Self {
        Question {
            qname,
            qtype,
            qclass,
        }
    }

    pub fn qname(&self) -> &Name {
        &self.qname
    }

    pub fn qtype(&self) -> Rtype {
        self.qtype
    }

    pub fn qclass(&self) -> Class {
        self.qclass
    }

    pub fn read<R: ReadStream + ?Sized>(
        stream: &mut R,
    ) -> Result<Self, StreamError> {
        let qname = stream.read_name()?;
        let qtype = stream.read_u16().map_err(|err| err.into_truncated(4, 0))?;
        let qclass =
            stream.read_u16().map_err(|err| err.into_truncated(4, 2))?;
        Ok(Question::new(qname, qtype.into(), qclass.into()))
    }

    pub fn compose<Target: Composer + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        target.append_compressed_name(&self.qname)?;
        compose_u16(target, self.qtype.to_int())?;
        compose_u16(target, self.qclass.to_int())
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.qname, self.qclass, self.qtype)
    }
}

//------------ Section -------------------------------------------------------

/// The sections of a message.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Section {
    Question,
    Answer,
    Authority,
    Additional,
}

impl Section {
    fn next_record_section(self) -> Option<Self> {
        match self {
            Section::Question => Some(Section::Answer),
            Section::Answer => Some(Section::Authority),
            Section::Authority => Some(Section::Additional),
            Section::Additional => None,
        }
    }
}

//------------ MessageBuilder ------------------------------------------------

/// Assembles a DNS message.
///
/// Sections have to be filled in order. Owner names and question names are
/// compressed against earlier names in the message. A push that would make
/// the message exceed its size limit leaves the message unchanged.
#[derive(Clone, Debug)]
pub struct MessageBuilder {
    target: Compressor,
    header: Header,
    counts: HeaderCounts,
    section: Section,
}

impl MessageBuilder {
    pub fn new(header: Header) -> Self {
        let mut target = Compressor::default();
        target.buf.resize(HEADER_LEN, 0);
        MessageBuilder {
            target,
            header,
            counts: HeaderCounts::default(),
            section: Section::Question,
        }
    }

    pub fn header(&self) -> Header {
        self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    pub fn counts(&self) -> HeaderCounts {
        self.counts
    }

    /// Returns the current length of the message.
    pub fn len(&self) -> usize {
        self.target.buf.len()
    }

    /// Returns whether the message has no questions or records yet.
    pub fn is_empty(&self) -> bool {
        self.counts == HeaderCounts::default()
    }

    pub fn push_question(&mut self, question: &Question) -> Result<(), PushError> {
        self.push(Section::Question, MAX_MESSAGE_LEN, |target| {
            question.compose(target)
        })
    }

    /// Appends a record to the answer section.
    pub fn push_answer(&mut self, record: &Record) -> Result<(), PushError> {
        self.push_answer_limited(record, MAX_MESSAGE_LEN)
    }

    /// Appends a record to the answer section if the message stays within
    /// `limit` octets.
    pub fn push_answer_limited(
        &mut self,
        record: &Record,
        limit: usize,
    ) -> Result<(), PushError> {
        self.push(Section::Answer, limit, |target| record.compose(target))
    }

    pub fn push_authority(&mut self, record: &Record) -> Result<(), PushError> {
        self.push(Section::Authority, MAX_MESSAGE_LEN, |target| {
            record.compose(target)
        })
    }

    fn push(
        &mut self,
        section: Section,
        limit: usize,
        op: impl FnOnce(&mut Compressor) -> Result<(), Infallible>,
    ) -> Result<(), PushError> {
        if section < self.section {
            return Err(PushError::SectionOrder);
        }
        if self.counts.get(section) == u16::MAX {
            return Err(PushError::CountOverflow);
        }
        let len = self.target.buf.len();
        octseq::builder::infallible(op(&mut self.target));
        if self.target.buf.len() > core::cmp::min(limit, MAX_MESSAGE_LEN) {
            self.target.truncate(len);
            return Err(PushError::ShortBuf);
        }
        self.section = section;
        *self.counts.get_mut(section) += 1;
        Ok(())
    }

    /// Finishes the message and returns its wire format.
    pub fn finish(mut self) -> Bytes {
        HeaderSection {
            header: self.header,
            counts: self.counts,
        }
        .compose_into(&mut self.target.buf);
        self.target.buf.into()
    }
}

//------------ Compressor ----------------------------------------------------

/// An octets builder compressing names against earlier names.
///
/// Suffixes are remembered with their position. Only positions that fit
/// into the 14 bits of a compression pointer can be used. Suffixes are
/// matched on their exact octets so that names keep their case.
#[derive(Clone, Debug, Default)]
struct Compressor {
    buf: Vec<u8>,
    names: HashMap<Vec<u8>, u16>,
}

impl OctetsBuilder for Compressor {
    type AppendError = Infallible;

    fn append_slice(&mut self, slice: &[u8]) -> Result<(), Infallible> {
        self.buf.extend_from_slice(slice);
        Ok(())
    }
}

impl Truncate for Compressor {
    fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
        self.names.retain(|_, pos| usize::from(*pos) < len);
    }
}

impl AsRef<[u8]> for Compressor {
    fn as_ref(&self) -> &[u8] {
        self.buf.as_ref()
    }
}

impl AsMut<[u8]> for Compressor {
    fn as_mut(&mut self) -> &mut [u8] {
        self.buf.as_mut()
    }
}

impl Composer for Compressor {
    fn append_compressed_name(&mut self, name: &Name) -> Result<(), Infallible> {
        let start = self.buf.len();
        let wire = name.as_wire();
        for (offset, suffix) in name.suffixes() {
            if let Some(&pos) = self.names.get(suffix) {
                self.buf.extend_from_slice(&wire[..offset]);
                self.buf.extend_from_slice(&(0xC000 | pos).to_be_bytes());
                return Ok(());
            }
            if let Ok(pos) = u16::try_from(start + offset) {
                if pos < 0x4000 {
                    self.names.insert(suffix.to_vec(), pos);
                }
            }
        }
        self.buf.extend_from_slice(wire);
        Ok(())
    }
}

//------------ PushError -----------------------------------------------------

/// Something could not be added to a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PushError {
    /// The message would exceed its size limit.
    ShortBuf,

    /// A section count would overflow.
    CountOverflow,

    /// An earlier section was pushed to after a later one.
    SectionOrder,
}

impl From<ShortBuf> for PushError {
    fn from(_: ShortBuf) -> Self {
        PushError::ShortBuf
    }
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PushError::ShortBuf => f.write_str("message size exceeded"),
            PushError::CountOverflow => f.write_str("section count overflow"),
            PushError::SectionOrder => f.write_str("section out of order"),
        }
    }
}

impl std::error::Error for PushError {}

//------------ MessageReader -------------------------------------------------

/// Takes a received message apart.
///
/// The questions have to be read first via
/// [`read_questions`][Self::read_questions]. Afterwards,
/// [`next_record`][Self::next_record] walks over the records of the
/// remaining three sections.
#[derive(Debug)]
pub struct MessageReader {
    header: HeaderSection,
    stream: MemoryReader,
    section: Section,
    left: u16,
}

impl MessageReader {
    pub fn new(message: Bytes) -> Result<Self, StreamError> {
        let header = HeaderSection::parse(message.as_ref())?;
        let mut stream = MemoryReader::new(message);
        stream.skip_exact(HEADER_LEN)?;
        Ok(MessageReader {
            left: header.counts.qdcount,
            header,
            stream,
            section: Section::Question,
        })
    }

    pub fn header(&self) -> Header {
        self.header.header
    }

    pub fn counts(&self) -> HeaderCounts {
        self.header.counts
    }

    /// Reads the question section.
    pub fn read_questions(&mut self) -> Result<Vec<Question>, StreamError> {
        let mut res = Vec::new();
        if self.section != Section::Question {
            return Ok(res);
        }
        while self.left > 0 {
            res.push(Question::read(&mut self.stream).map_err(|err| {
                err.into_truncated(usize::from(self.left), 0)
            })?);
            self.left -= 1;
        }
        self.advance_section();
        Ok(res)
    }

    /// Returns the next record and the section it was found in.
    ///
    /// Returns `Ok(None)` once all sections are exhausted. If the message
    /// ends before all records announced in the header were read, returns
    /// a truncation error.
    pub fn next_record(
        &mut self,
    ) -> Result<Option<(Section, Record)>, RecordError> {
        if self.section == Section::Question {
            self.read_questions()?;
        }
        while self.left == 0 {
            if !self.advance_section() {
                return Ok(None);
            }
        }
        let record = Record::read(&mut self.stream).map_err(|err| {
            if err.is_end_of_stream() {
                RecordError::Stream(StreamError::Truncated {
                    expected: usize::from(self.left),
                    read: 0,
                })
            } else {
                err
            }
        })?;
        self.left -= 1;
        Ok(Some((self.section, record)))
    }

    /// Returns the number of octets left after the last record read.
    pub fn remaining(&self) -> usize {
        self.stream.remaining()
    }

    fn advance_section(&mut self) -> bool {
        match self.section.next_record_section() {
            Some(section) => {
                self.section = section;
                self.left = self.header.counts.get(section);
                true
            }
            None => false,
        }
    }
}

//------------ Framing -------------------------------------------------------

/// Reads a length-prefixed message from a stream.
///
/// Returns `Ok(None)` if the stream ended cleanly before the length
/// prefix. A stream ending anywhere later is a truncation.
pub fn read_framed<R: ReadStream + ?Sized>(
    stream: &mut R,
) -> Result<Option<Bytes>, StreamError> {
    let len = match stream.read_u16() {
        Ok(len) => usize::from(len),
        Err(StreamError::EndOfStream) => return Ok(None),
        Err(err) => return Err(err),
    };
    stream
        .read_octets(len)
        .map(Some)
        .map_err(|err| err.into_truncated(len, 0))
}

/// Writes a message prefixed with its length to a stream.
pub fn write_framed<W: WriteStream + ?Sized>(
    stream: &mut W,
    message: &[u8],
) -> Result<(), StreamError> {
    let len =
        u16::try_from(message.len()).map_err(|_| StreamError::LimitExceeded)?;
    stream.write_u16(len)?;
    stream.write_all(message)
}

//============ Testing =======================================================
