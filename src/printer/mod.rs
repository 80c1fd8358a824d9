//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Schema printers.

pub(crate) mod json;
pub(crate) mod tree;
pub(crate) mod yang;
pub(crate) mod yin;
