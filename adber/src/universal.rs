//! Universal tag numbers of the types LDAP traffics in.

/// Universal-class tag numbers. The values are the bare tag numbers;
/// constructed types additionally carry the constructed bit on the wire
/// (SEQUENCE is transmitted as `0x30`, SET as `0x31`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum Types {
    Boolean = 1,
    Integer = 2,
    OctetString = 4,
    Null = 5,
    ObjectIdentifier = 6,
    Enumerated = 10,
    Sequence = 16,
    Set = 17,
}
