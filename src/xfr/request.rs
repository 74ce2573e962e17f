//! Transfer requests.

use core::fmt;

use bytes::Bytes;
use tracing::trace;

use crate::base::iana::{Class, Opcode, Rtype};
use crate::base::message::{
    read_framed, write_framed, Header, MessageBuilder, MessageReader,
    PushError, Question, Section,
};
use crate::base::name::Name;
use crate::base::record::{Record, RecordError};
use crate::base::serial::Serial;
use crate::stream::{ReadStream, StreamError, WriteStream};

use super::types::XfrType;

//------------ XfrRequest ----------------------------------------------------

/// A request for a zone transfer.
///
/// An IXFR request carries the SOA record of the version the client has in
/// the authority section of the query as RFC 1995 requires.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct XfrRequest {
    pub id: u16,
    pub origin: Name,
    pub class: Class,
    pub xfr_type: XfrType,
    pub client_soa: Option<Record>,

    /// The primary’s serial the transfer is expected to reach.
    ///
    /// This is known if the primary’s SOA record was queried before the
    /// request was made. It is local state and not part of the message.
    pub target_serial: Option<Serial>,
}

impl XfrRequest {
    pub fn axfr(id: u16, origin: Name) -> Self {
        XfrRequest {
            id,
            origin,
            class: Class::IN,
            xfr_type: XfrType::Axfr,
            client_soa: None,
            target_serial: None,
        }
    }

    /// Creates an IXFR request.
    ///
    /// The class of the request is taken from the SOA record.
    pub fn ixfr(id: u16, origin: Name, client_soa: Record) -> Self {
        XfrRequest {
            id,
            origin,
            class: client_soa.class(),
            xfr_type: XfrType::Ixfr,
            client_soa: Some(client_soa),
            target_serial: None,
        }
    }

    /// Sets the serial the transfer is expected to reach.
    pub fn with_target(mut self, serial: Serial) -> Self {
        self.target_serial = Some(serial);
        self
    }

    /// Returns the serial of the client’s version of the zone.
    pub fn client_serial(&self) -> Option<Serial> {
        self.client_soa
            .as_ref()
            .and_then(Record::soa)
            .map(|soa| soa.serial())
    }

    pub fn question(&self) -> Question {
        Question::new(self.origin.clone(), self.xfr_type.rtype(), self.class)
    }

    /// Composes the request message.
    pub fn compose(&self) -> Result<Bytes, PushError> {
        let mut header = Header::new();
        header.set_id(self.id);
        header.set_opcode(Opcode::QUERY);
        let mut builder = MessageBuilder::new(header);
        builder.push_question(&self.question())?;
        if let Some(soa) = self.client_soa.as_ref() {
            builder.push_authority(soa)?;
        }
        Ok(builder.finish())
    }

    /// Parses a request message.
    pub fn parse(message: Bytes) -> Result<Self, RequestError> {
        let mut reader = MessageReader::new(message)?;
        let header = reader.header();
        if header.qr() || header.opcode() != Opcode::QUERY {
            return Err(RequestError::NotQuery);
        }
        let questions = reader.read_questions()?;
        let question = match questions.as_slice() {
            [question] => question,
            _ => return Err(RequestError::QuestionCount(questions.len())),
        };
        let xfr_type = XfrType::try_from(question.qtype())
            .map_err(|_| RequestError::NotXfr(question.qtype()))?;

        let mut client_soa = None;
        while let Some((section, record)) = reader.next_record()? {
            if section == Section::Authority
                && record.rtype() == Rtype::SOA
                && record.owner() == question.qname()
                && client_soa.is_none()
            {
                client_soa = Some(record);
            }
        }
        if xfr_type == XfrType::Ixfr && client_soa.is_none() {
            return Err(RequestError::MissingClientSoa);
        }
        trace!("Parsed {} request for {}", xfr_type, question.qname());
        Ok(XfrRequest {
            id: header.id(),
            origin: question.qname().clone(),
            class: question.qclass(),
            xfr_type,
            client_soa,
            target_serial: None,
        })
    }

    /// Writes the request as a length-prefixed message.
    pub fn write<W: WriteStream + ?Sized>(
        &self,
        stream: &mut W,
    ) -> Result<(), RequestError> {
        write_framed(stream, &self.compose()?)?;
        stream.flush()?;
        Ok(())
    }

    /// Reads a length-prefixed request message.
    ///
    /// Returns `Ok(None)` if the stream ended before a message started.
    pub fn read<R: ReadStream + ?Sized>(
        stream: &mut R,
    ) -> Result<Option<Self>, RequestError> {
        match read_framed(stream)? {
            Some(message) => Self::parse(message).map(Some),
            None => Ok(None),
        }
    }
}

impl fmt::Display for XfrRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.xfr_type, self.origin)?;
        if let Some(serial) = self.client_serial() {
            write!(f, " from serial {serial}")?;
        }
        Ok(())
    }
}

//------------ RequestError --------------------------------------------------

/// A transfer request could not be read or written.
#[derive(Debug)]
pub enum RequestError {
    Stream(StreamError),
    Record(RecordError),
    Compose(PushError),

    /// The message is not a query.
    NotQuery,

    /// The message doesn’t have exactly one question.
    QuestionCount(usize),

    /// The question is not for AXFR or IXFR.
    NotXfr(Rtype),

    /// An IXFR request lacks the client’s SOA record.
    MissingClientSoa,
}

impl From<StreamError> for RequestError {
    fn from(err: StreamError) -> Self {
        RequestError::Stream(err)
    }
}

impl From<RecordError> for RequestError {
    fn from(err: RecordError) -> Self {
        RequestError::Record(err)
    }
}

impl From<PushError> for RequestError {
    fn from(err: PushError) -> Self {
        RequestError::Compose(err)
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RequestError::Stream(err) => write!(f, "{err}"),
            RequestError::Record(err) => write!(f, "{err}"),
            RequestError::Compose(err) => write!(f, "{err}"),
            RequestError::NotQuery => f.write_str("message is not a query"),
            RequestError::QuestionCount(count) => {
                write!(f, "expected one question, found {count}")
            }
            RequestError::NotXfr(rtype) => {
                write!(f, "{rtype} is not a transfer type")
            }
            RequestError::MissingClientSoa => {
                f.write_str("IXFR request lacks authority section SOA")
            }
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Stream(err) => Some(err),
            RequestError::Record(err) => Some(err),
            RequestError::Compose(err) => Some(err),
            _ => None,
        }
    }
}

//============ Testing =======================================================
