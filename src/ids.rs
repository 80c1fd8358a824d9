//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Arena index types.
//!
//! Schema and data nodes live in arenas owned by the context and by each data
//! tree respectively. Cross references between nodes are stored as these
//! typed indices instead of pointers. `NonZeroU32` keeps `Option<Id>` the same
//! size as the id itself.

use std::num::NonZeroU32;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Create from a 0-based arena index.
            pub(crate) fn from_index(index: usize) -> Self {
                Self(NonZeroU32::MIN.saturating_add(index as u32))
            }

            /// Get the 0-based arena index.
            pub(crate) fn to_index(self) -> usize {
                (self.0.get() - 1) as usize
            }
        }
    };
}

define_id!(
    /// Module identifier, unique within a context.
    ModuleId
);

define_id!(
    /// Compiled schema node identifier.
    SchemaId
);

define_id!(
    /// Compiled identity identifier.
    IdentityId
);

define_id!(
    /// Data node identifier, unique within a data tree.
    DataId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_roundtrip() {
        for index in [0usize, 1, 7, 65535] {
            assert_eq!(SchemaId::from_index(index).to_index(), index);
        }
    }

    #[test]
    fn option_niche() {
        assert_eq!(
            std::mem::size_of::<Option<DataId>>(),
            std::mem::size_of::<DataId>()
        );
    }
}
