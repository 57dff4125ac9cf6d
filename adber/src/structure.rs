//! Generic tagged value, the unit of serialization and parsing.

use crate::common::TagClass;

/// A BER value with its payload already reduced to wire-ready form.
///
/// Typed builders from [`tags`](crate::tags) are converted into this
/// representation before encoding; the parser produces it directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructureTag {
    pub class: TagClass,
    pub id: u64,
    pub payload: PL,
}

/// Payload of a tagged value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PL {
    /// Primitive: raw content octets.
    P(Vec<u8>),
    /// Constructed: the sequence of inner values.
    C(Vec<StructureTag>),
}

impl StructureTag {
    /// Keep the value only if it belongs to `class`.
    pub fn match_class(self, class: TagClass) -> Option<Self> {
        if self.class == class { Some(self) } else { None }
    }

    /// Keep the value only if its tag number is `id`.
    pub fn match_id(self, id: u64) -> Option<Self> {
        if self.id == id { Some(self) } else { None }
    }

    /// Unwrap a constructed payload.
    pub fn expect_constructed(self) -> Option<Vec<StructureTag>> {
        match self.payload {
            PL::P(_) => None,
            PL::C(inner) => Some(inner),
        }
    }

    /// Unwrap a primitive payload.
    pub fn expect_primitive(self) -> Option<Vec<u8>> {
        match self.payload {
            PL::P(bytes) => Some(bytes),
            PL::C(_) => None,
        }
    }

    /// True if the payload is constructed.
    pub fn is_constructed(&self) -> bool {
        matches!(self.payload, PL::C(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_and_id_filters() {
        let tag = StructureTag {
            class: TagClass::Application,
            id: 1,
            payload: PL::P(vec![0x0A]),
        };
        assert_eq!(
            tag.clone()
                .match_class(TagClass::Application)
                .and_then(|t| t.match_id(1)),
            Some(tag.clone())
        );
        assert!(tag.clone().match_class(TagClass::Context).is_none());
        assert!(tag.match_id(2).is_none());
    }

    #[test]
    fn payload_unwrapping() {
        let prim = StructureTag {
            class: TagClass::Universal,
            id: 4,
            payload: PL::P(vec![1, 2, 3]),
        };
        assert_eq!(prim.clone().expect_primitive(), Some(vec![1, 2, 3]));
        assert!(prim.expect_constructed().is_none());

        let cons = StructureTag {
            class: TagClass::Universal,
            id: 16,
            payload: PL::C(vec![]),
        };
        assert!(cons.is_constructed());
        assert_eq!(cons.expect_constructed(), Some(vec![]));
    }
}
