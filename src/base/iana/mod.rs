//! IANA Definitions for DNS.
//!
//! This module contains enums for parameters defined in IANA registries
//! that are relevant for zone transfers.

pub use self::class::Class;
pub use self::opcode::Opcode;
pub use self::rcode::Rcode;
pub use self::rtype::Rtype;

#[macro_use]
mod macros;

pub mod class;
pub mod opcode;
pub mod rcode;
pub mod rtype;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mnemonics() {
        assert_eq!(Rtype::SOA.to_string(), "SOA");
        assert_eq!(Rtype::from_int(65280).to_string(), "TYPE65280");
        assert_eq!(Rtype::from_mnemonic(b"ixfr"), Some(Rtype::IXFR));
        assert_eq!(Class::IN.to_string(), "IN");
        assert_eq!(format!("{:?}", Rcode::NOTAUTH), "Rcode::NOTAUTH");
        assert_eq!(u16::from(Rtype::AXFR), 252);
    }
}
