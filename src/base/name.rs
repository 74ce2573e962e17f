//! Domain names.
//!
//! A [`Name`] is an owned, absolute domain name kept in uncompressed wire
//! format. The label and length limits are checked whenever a name is
//! created, be it from wire data, from its presentation format, or from a
//! stream via [`ReadStreamExt::read_name`].
//!
//! Names preserve the case they were created with but compare, order, and
//! hash ignoring ASCII case.
//!
//! [`ReadStreamExt::read_name`]: crate::stream::ReadStreamExt::read_name

use bytes::Bytes;
use core::{cmp, fmt, hash, str};
use octseq::builder::OctetsBuilder;

//------------ Name ----------------------------------------------------------

#[derive(Clone)]
pub struct Name(Bytes);

impl Name {
    /// Domain names have a maximum length of 255 octets in wire format.
    pub const MAX_LEN: usize = 255;

    /// Labels have a maximum length of 63 octets.
    pub const MAX_LABEL_LEN: usize = 63;

    /// Returns the root name.
    pub fn root() -> Self {
        Name(Bytes::from_static(b"\0"))
    }

    /// Creates a name from uncompressed wire format data.
    ///
    /// The data must contain exactly one name ending in the root label.
    pub fn from_wire(wire: impl Into<Bytes>) -> Result<Self, NameError> {
        let wire = wire.into();
        Self::check_wire(&wire)?;
        Ok(Name(wire))
    }

    fn check_wire(wire: &[u8]) -> Result<(), NameError> {
        if wire.len() > Self::MAX_LEN {
            return Err(NameError::LongName);
        }
        let mut pos = 0;
        loop {
            let len = match wire.get(pos) {
                Some(len) => usize::from(*len),
                None => return Err(NameError::ShortInput),
            };
            if len > Self::MAX_LABEL_LEN {
                return Err(NameError::LongLabel);
            }
            pos += len + 1;
            if len == 0 {
                break;
            }
        }
        if pos != wire.len() {
            return Err(NameError::TrailingData);
        }
        Ok(())
    }

    /// Returns the uncompressed wire format of the name.
    pub fn as_wire(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Returns the length of the name in wire format.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether this is the root name.
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Returns an iterator over the non-root labels of the name.
    pub fn labels(&self) -> Labels<'_> {
        Labels {
            wire: self.as_wire(),
            pos: 0,
        }
    }

    /// Returns the wire format of each suffix of the name together with its
    /// offset into the name.
    ///
    /// The root label is not included. This is what name compression needs.
    pub fn suffixes(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        let wire = self.as_wire();
        let mut pos = 0;
        core::iter::from_fn(move || {
            let len = usize::from(*wire.get(pos)?);
            if len == 0 {
                return None;
            }
            let res = (pos, &wire[pos..]);
            pos += len + 1;
            Some(res)
        })
    }

    /// Returns whether `self` is equal to or below `base`.
    pub fn ends_with(&self, base: &Name) -> bool {
        self.suffixes()
            .map(|(_, suffix)| suffix)
            .chain(core::iter::once(&b"\0"[..]))
            .any(|suffix| suffix.eq_ignore_ascii_case(base.as_wire()))
    }

    /// Appends the uncompressed name to an octets builder.
    pub fn compose<Target: OctetsBuilder + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        target.append_slice(self.as_wire())
    }
}

//--- FromStr

impl str::FromStr for Name {
    type Err = NameError;

    /// Parses a name in presentation format.
    ///
    /// The name is always taken as absolute, the trailing dot is optional.
    /// Escape sequences are not supported.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "." || s.is_empty() {
            return Ok(Self::root());
        }
        let s = s.strip_suffix('.').unwrap_or(s);
        let mut builder = NameBuilder::new();
        for label in s.split('.') {
            if label.is_empty() {
                return Err(NameError::EmptyLabel);
            }
            builder.push_label(label.as_bytes())?;
        }
        builder.finish()
    }
}

//--- PartialEq, Eq, Hash, PartialOrd, Ord

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.as_wire().eq_ignore_ascii_case(other.as_wire())
    }
}

impl Eq for Name {}

impl hash::Hash for Name {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        for ch in self.as_wire() {
            ch.to_ascii_lowercase().hash(state)
        }
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.as_wire()
            .iter()
            .map(u8::to_ascii_lowercase)
            .cmp(other.as_wire().iter().map(u8::to_ascii_lowercase))
    }
}

//--- Display and Debug

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_root() {
            return f.write_str(".");
        }
        for label in self.labels() {
            for &ch in label {
                if ch == b'.' || ch == b'\\' {
                    write!(f, "\\{}", ch as char)?;
                } else if ch.is_ascii_graphic() {
                    write!(f, "{}", ch as char)?;
                } else {
                    write!(f, "\\{:03}", ch)?;
                }
            }
            f.write_str(".")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

//------------ Labels --------------------------------------------------------

/// An iterator over the non-root labels of a name.
pub struct Labels<'a> {
    wire: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Labels<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let len = usize::from(*self.wire.get(self.pos)?);
        if len == 0 {
            return None;
        }
        let start = self.pos + 1;
        self.pos = start + len;
        self.wire.get(start..self.pos)
    }
}

//------------ NameBuilder ---------------------------------------------------

/// Assembles a name label by label, enforcing the length limits.
#[derive(Clone, Debug, Default)]
pub struct NameBuilder {
    wire: Vec<u8>,
}

impl NameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a label.
    ///
    /// Fails if the label is empty, longer than 63 octets, or if the name
    /// including the final root label would exceed 255 octets.
    pub fn push_label(&mut self, label: &[u8]) -> Result<(), NameError> {
        if label.is_empty() {
            return Err(NameError::EmptyLabel);
        }
        if label.len() > Name::MAX_LABEL_LEN {
            return Err(NameError::LongLabel);
        }
        if self.wire.len() + label.len() + 2 > Name::MAX_LEN {
            return Err(NameError::LongName);
        }
        self.wire.push(label.len() as u8);
        self.wire.extend_from_slice(label);
        Ok(())
    }

    /// Returns the current wire length without the root label.
    pub fn len(&self) -> usize {
        self.wire.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wire.is_empty()
    }

    /// Terminates the name with the root label.
    pub fn finish(mut self) -> Result<Name, NameError> {
        self.wire.push(0);
        Ok(Name(self.wire.into()))
    }
}

//------------ NameError -----------------------------------------------------

/// A domain name could not be created.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameError {
    /// A label was longer than 63 octets.
    LongLabel,

    /// The name was longer than 255 octets.
    LongName,

    /// An empty label appeared before the end of the name.
    EmptyLabel,

    /// The wire data ended before the root label.
    ShortInput,

    /// There was data after the root label.
    TrailingData,
}

impl fmt::Display for NameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameError::LongLabel => f.write_str("label exceeds 63 octets"),
            NameError::LongName => f.write_str("name exceeds 255 octets"),
            NameError::EmptyLabel => f.write_str("empty label"),
            NameError::ShortInput => f.write_str("unexpected end of name"),
            NameError::TrailingData => f.write_str("trailing data after name"),
        }
    }
}

impl std::error::Error for NameError {}

//============ Testing =======================================================
