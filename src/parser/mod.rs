//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Schema source readers.

pub(crate) mod lexer;
pub(crate) mod stmt;
pub(crate) mod yin;

pub use stmt::Stmt;

use crate::error::Result;
use crate::schema::SchemaInputFormat;

/// Read a module or submodule source into its statement tree.
pub(crate) fn parse_stmt(source: &str, format: SchemaInputFormat) -> Result<Stmt> {
    match format {
        SchemaInputFormat::YANG => lexer::parse_yang(source),
        SchemaInputFormat::YIN => yin::parse_yin(source),
    }
}
