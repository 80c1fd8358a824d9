//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

/// A trait implemented by all handle types that can be created from an arena
/// index and a generic container type.
#[doc(hidden)]
pub trait Binding<'a>
where
    Self: Sized,
    <Self as Binding<'a>>::Container: 'a,
{
    type Id: Copy;
    type Container: ?Sized;

    fn from_id(container: &'a Self::Container, id: Self::Id) -> Self;

    fn from_id_opt(
        container: &'a Self::Container,
        id: Option<Self::Id>,
    ) -> Option<Self> {
        id.map(|id| Self::from_id(container, id))
    }
}

/// Split a prefixed identifier (`prefix:name`).
pub(crate) fn split_prefix(s: &str) -> (Option<&str>, &str) {
    match s.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, s),
    }
}

/// Check a YANG identifier (RFC 7950 section 6.2).
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => (),
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Check a revision date (`YYYY-MM-DD`).
pub(crate) fn is_revision_date(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_identifier("ietf-interfaces"));
        assert!(is_identifier("_x.y"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn revisions() {
        assert!(is_revision_date("2018-02-20"));
        assert!(!is_revision_date("2018-2-20"));
    }
}
