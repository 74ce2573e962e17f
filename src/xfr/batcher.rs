//! Splitting an answer into messages.

use tracing::trace;

use crate::base::message::{
    write_framed, Header, MessageBuilder, PushError, Question,
};
use crate::base::record::Record;
use crate::stream::WriteStream;

use super::error::XfrErrorKind;

//------------ MessageBatcher ------------------------------------------------

/// Collects answer records into messages and writes them to a stream.
///
/// A message is written once adding the next record would take it over the
/// soft size limit or once it holds the maximum number of records. A record
/// that doesn’t fit the size limit even in an empty message is sent on its
/// own as long as it fits into a DNS message at all. Only the first message
/// carries the question.
pub(super) struct MessageBatcher<'a, W: ?Sized> {
    stream: &'a mut W,
    header: Header,
    question: Option<Question>,
    soft_byte_limit: usize,
    hard_rr_limit: u16,
    builder: Option<MessageBuilder>,
    messages: usize,
    records: usize,
    octets: usize,
}

impl<'a, W: WriteStream + ?Sized> MessageBatcher<'a, W> {
    pub fn new(
        stream: &'a mut W,
        header: Header,
        question: Question,
        soft_byte_limit: usize,
        hard_rr_limit: u16,
    ) -> Self {
        MessageBatcher {
            stream,
            header,
            question: Some(question),
            soft_byte_limit,
            hard_rr_limit: hard_rr_limit.max(1),
            builder: None,
            messages: 0,
            records: 0,
            octets: 0,
        }
    }

    /// Adds a record to the answer.
    pub fn push(&mut self, record: &Record) -> Result<(), XfrErrorKind> {
        if let Some(builder) = self.builder.as_ref() {
            if builder.counts().ancount >= self.hard_rr_limit {
                self.flush_message()?;
            }
        }
        let limit = self.soft_byte_limit;
        let builder = self.builder()?;
        let res = builder.push_answer_limited(record, limit);
        let empty = builder.counts().ancount == 0;
        match res {
            Ok(()) => {}
            Err(PushError::ShortBuf) if empty => {
                // Alone in a message, the soft limit doesn’t apply.
                self.builder()?.push_answer(record)?;
            }
            Err(PushError::ShortBuf) => {
                self.flush_message()?;
                let builder = self.builder()?;
                if builder.push_answer_limited(record, limit).is_err() {
                    builder.push_answer(record)?;
                }
            }
            Err(err) => return Err(err.into()),
        }
        self.records += 1;
        Ok(())
    }

    /// Writes the last message and flushes the stream.
    ///
    /// If nothing was pushed at all, a message with only the question is
    /// written. Returns the number of messages, records, and octets
    /// written.
    pub fn finish(mut self) -> Result<(usize, usize, usize), XfrErrorKind> {
        if self.builder.is_some() || self.messages == 0 {
            self.builder()?;
            self.flush_message()?;
        }
        self.stream.flush()?;
        Ok((self.messages, self.records, self.octets))
    }

    fn builder(&mut self) -> Result<&mut MessageBuilder, XfrErrorKind> {
        let builder = match self.builder.take() {
            Some(builder) => builder,
            None => {
                let mut builder = MessageBuilder::new(self.header);
                if let Some(question) = self.question.take() {
                    builder.push_question(&question)?;
                }
                builder
            }
        };
        Ok(self.builder.insert(builder))
    }

    fn flush_message(&mut self) -> Result<(), XfrErrorKind> {
        let builder = match self.builder.take() {
            Some(builder) => builder,
            None => return Ok(()),
        };
        let ancount = builder.counts().ancount;
        let message = builder.finish();
        write_framed(&mut *self.stream, &message)?;
        self.messages += 1;
        self.octets += message.len() + 2;
        trace!(
            "Sent message {} with {} records, {} octets",
            self.messages,
            ancount,
            message.len()
        );
        Ok(())
    }
}

//============ Testing =======================================================
