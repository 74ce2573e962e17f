//! DNS OpCodes

//------------ Opcode --------------------------------------------------------

int_enum! {
    /// DNS OpCodes.
    ///
    /// The opcode specifies the kind of query to be performed. Transfers are
    /// plain queries; NOTIFY is listed so secondaries can recognise the
    /// trigger for an out-of-schedule refresh.
    =>
    Opcode, u8, "OPCODE";

    /// A standard query.
    (QUERY => 0, "QUERY")

    /// A zone change notification (RFC 1996).
    (NOTIFY => 4, "NOTIFY")
}
