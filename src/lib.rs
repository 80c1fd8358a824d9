//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! A YANG schema compiler and data tree engine.
//!
//! YANG modules (RFC 7950) are loaded into a [`Context`], which parses them
//! (YANG or YIN), resolves imports and includes, and compiles the whole
//! module set into one resolved schema tree. Data trees are then built,
//! parsed (XML, JSON or the LYB binary format), validated, merged, diffed
//! and printed against that schema.
//!
//! ## Design Goals
//! * Leverage Rust's ownership system to detect API misuse problems at compile
//!   time: schema handles and data trees borrow the context they belong to
//! * All-or-nothing schema changes: a failing module load leaves the context
//!   as it was
//! * No global state: diagnostics and plugins are owned by each context
//!
//! ## Examples
//!
//! See the `demos/` directory of the repository.
//!
//! [`Context`]: crate::context::Context

mod compiled;
mod compiler;
mod dict;
mod error;
mod ids;
mod modules;
mod parser;
mod printer;
mod value;
mod xpath;

pub mod context;
pub mod data;
pub mod dict_path;
pub mod diff;
pub mod extension;
pub mod iter;
pub mod keyed_list;
pub mod logging;
pub mod parsed;
pub mod schema;
pub mod utils;

pub use crate::error::{CompilePass, Error, ErrorCode, Result};
pub use crate::ids::{DataId, IdentityId, ModuleId, SchemaId};
pub use crate::parser::Stmt;
