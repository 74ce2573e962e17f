//! Serial numbers.
//!
//! DNS uses 32 bit serial numbers to version zones. They are conceptionally
//! viewed as the 32 bit modulus of a larger number space and therefore wrap
//! around. [RFC 1982] defines how to compare such values. This module
//! provides the comparison predicates as plain functions over `u32` as well
//! as the type [`Serial`] that builds its ordering on top of them.
//!
//! All decisions about whether one copy of a zone is newer than another
//! are made through these predicates.
//!
//! [RFC 1982]: https://tools.ietf.org/html/rfc1982

use core::cmp::Ordering;
use core::{cmp, fmt, str};

/// Half of the serial number space, `2^(SERIAL_BITS - 1)`.
const HALF: u32 = 0x8000_0000;

//------------ Predicates ----------------------------------------------------

/// Returns whether serial `a` is greater, i.e., newer, than serial `b`.
///
/// If the two values are exactly `2^31` apart, neither is greater than the
/// other.
pub fn greater(a: u32, b: u32) -> bool {
    (a < b && b.wrapping_sub(a) > HALF) || (a > b && a.wrapping_sub(b) < HALF)
}

/// Returns whether serial `a` is less, i.e., older, than serial `b`.
///
/// If the two values are exactly `2^31` apart, neither is less than the
/// other.
pub fn less(a: u32, b: u32) -> bool {
    (a < b && b.wrapping_sub(a) < HALF) || (a > b && a.wrapping_sub(b) > HALF)
}

/// Returns whether serial `a` is equal to or greater than serial `b`.
pub fn greater_or_equal(a: u32, b: u32) -> bool {
    a == b || greater(a, b)
}

/// Returns whether serial `a` is equal to or less than serial `b`.
pub fn less_or_equal(a: u32, b: u32) -> bool {
    a == b || less(a, b)
}

//------------ Serial --------------------------------------------------------

/// A serial number.
///
/// Serial numbers are used in DNS to track changes to resources. The SOA
/// record of a zone carries a serial number that expresses the version of
/// the zone. Since these numbers are only 32 bits long, they can wrap and
/// RFC 1982 defines the semantics for doing arithmetics in the face of
/// these wrap-arounds. This type implements these semantics atop a native
/// `u32`.
///
/// Serial numbers only implement a partial ordering: there are pairs of
/// values that are not equal but there still isn’t one value larger than
/// the other. Since this is neatly implemented by the `PartialOrd` trait,
/// the type implements that.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Serial(pub u32);

impl Serial {
    /// Returns the serial number as a raw integer.
    pub fn into_int(self) -> u32 {
        self.0
    }

    /// Add `other` to `self`.
    ///
    /// Serial numbers only allow values of up to `2^31 - 1` to be added to
    /// them. Therefore, this method requires `other` to be a `u32` instead
    /// of a `Serial` to indicate that you cannot simply add two serials
    /// together. This is also why we don’t implement the `Add` trait.
    ///
    /// # Panics
    ///
    /// This method panics if `other` is greater than `2^31 - 1`.
    #[allow(clippy::should_implement_trait)]
    pub fn add(self, other: u32) -> Self {
        assert!(other < HALF);
        Serial(self.0.wrapping_add(other))
    }

    /// Returns whether `self` is strictly newer than `other`.
    pub fn is_newer_than(self, other: Serial) -> bool {
        greater(self.0, other.0)
    }

    /// Returns whether `self` is strictly older than `other`.
    pub fn is_older_than(self, other: Serial) -> bool {
        less(self.0, other.0)
    }
}

//--- From and FromStr

impl From<u32> for Serial {
    fn from(value: u32) -> Serial {
        Serial(value)
    }
}

impl From<Serial> for u32 {
    fn from(serial: Serial) -> u32 {
        serial.0
    }
}

impl str::FromStr for Serial {
    type Err = <u32 as str::FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <u32 as str::FromStr>::from_str(s).map(Into::into)
    }
}

//--- Display

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--- PartialOrd

impl cmp::PartialOrd for Serial {
    fn partial_cmp(&self, other: &Serial) -> Option<cmp::Ordering> {
        if self.0 == other.0 {
            Some(Ordering::Equal)
        } else if less(self.0, other.0) {
            Some(Ordering::Less)
        } else if greater(self.0, other.0) {
            Some(Ordering::Greater)
        } else {
            None
        }
    }
}

//============ Testing =======================================================
