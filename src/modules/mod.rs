//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Modules embedded in the crate.

/// Modules loaded at context creation, in load order: name, revision and
/// YANG text.
pub(crate) const INTERNAL: &[(&str, &str, &str)] = &[
    (
        "ietf-yang-types",
        "2013-07-15",
        include_str!("ietf-yang-types@2013-07-15.yang"),
    ),
    (
        "ietf-inet-types",
        "2013-07-15",
        include_str!("ietf-inet-types@2013-07-15.yang"),
    ),
    (
        "ietf-datastores",
        "2018-02-14",
        include_str!("ietf-datastores@2018-02-14.yang"),
    ),
    (
        "ietf-yang-library",
        "2019-01-04",
        include_str!("ietf-yang-library@2019-01-04.yang"),
    ),
];

/// Text of an embedded module.
pub(crate) fn find(name: &str, revision: Option<&str>) -> Option<&'static str> {
    INTERNAL
        .iter()
        .find(|(n, r, _)| *n == name && revision.map_or(true, |rev| rev == *r))
        .map(|(_, _, text)| *text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup() {
        assert!(find("ietf-inet-types", None).is_some());
        assert!(find("ietf-inet-types", Some("2013-07-15")).is_some());
        assert!(find("ietf-inet-types", Some("2010-09-24")).is_none());
        assert!(find("ietf-interfaces", None).is_none());
    }
}
