//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Schema compiler.
//!
//! The whole module set of a context is compiled at once, in passes, into a
//! fresh [`CompiledSchema`]. The context swaps the new arena in only when all
//! passes succeeded.

pub(crate) mod augment;
pub(crate) mod consistency;
pub(crate) mod features;
pub(crate) mod identifiers;
pub(crate) mod leafref;
pub(crate) mod structure;
pub(crate) mod types;

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::compiled::CompiledSchema;
use crate::context::{ContextFlags, ModuleEntry};
use crate::dict::Dictionary;
use crate::error::{CompilePass, Result};
use crate::extension::ExtensionPlugin;
use crate::ids::ModuleId;
use crate::logging::LogSink;
use crate::parsed::{PGrouping, PTypedef};
use crate::xpath::{self, Expr};

/// Lexical scope of typedef and grouping definitions.
pub(crate) struct Scope<'c> {
    /// Module whose prefixes apply.
    pub module: ModuleId,
    pub typedefs: &'c [PTypedef],
    pub groupings: &'c [PGrouping],
    pub parent: Option<Rc<Scope<'c>>>,
}

pub(crate) struct Compiler<'c> {
    pub(crate) entries: &'c [ModuleEntry],
    pub(crate) dict: &'c mut Dictionary,
    pub(crate) sink: &'c LogSink,
    pub(crate) plugins: &'c [Box<dyn ExtensionPlugin>],
    pub(crate) options: ContextFlags,
    pub(crate) out: CompiledSchema,
    pub(crate) implemented: Vec<bool>,
    // Compiled typedefs keyed by the address of their parsed definition.
    typedef_cache: HashMap<usize, Arc<crate::compiled::CType>>,
    typedef_stack: Vec<usize>,
    grouping_stack: Vec<usize>,
}

/// Result of a successful compilation.
pub(crate) struct Compiled {
    pub schema: CompiledSchema,
    /// Implemented flags, including implicitly implemented modules.
    pub implemented: Vec<bool>,
}

/// Compile all modules of a context.
pub(crate) fn compile(
    entries: &[ModuleEntry],
    dict: &mut Dictionary,
    sink: &LogSink,
    plugins: &[Box<dyn ExtensionPlugin>],
    options: ContextFlags,
) -> Result<Compiled> {
    let implemented = entries
        .iter()
        .map(|e| e.implemented || options.contains(ContextFlags::ALL_IMPLEMENTED))
        .collect();
    let compiler = Compiler {
        entries,
        dict,
        sink,
        plugins,
        options,
        out: CompiledSchema::default(),
        implemented,
        typedef_cache: HashMap::new(),
        typedef_stack: Vec::new(),
        grouping_stack: Vec::new(),
    };
    compiler.run()
}

// ===== impl Compiler =====

impl<'c> Compiler<'c> {
    fn run(mut self) -> Result<Compiled> {
        self.pass(CompilePass::Identifiers, Self::compile_identifiers)?;
        self.pass(CompilePass::Types, Self::compile_typedefs)?;
        self.pass(CompilePass::Structure, Self::compile_structure)?;
        self.pass(CompilePass::AugmentDeviation, Self::apply_augments)?;
        self.pass(CompilePass::AugmentDeviation, Self::apply_deviations)?;
        self.pass(CompilePass::Features, Self::prune_features)?;
        self.pass(CompilePass::Leafref, Self::resolve_leafrefs)?;
        self.pass(CompilePass::Consistency, Self::check_consistency)?;
        Ok(Compiled {
            schema: self.out,
            implemented: self.implemented,
        })
    }

    fn pass(
        &mut self,
        pass: CompilePass,
        f: fn(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.sink.debug(format!("Compiling schema: {} pass.", pass));
        f(self).map_err(|err| err.with_pass(pass))
    }

    /// Top-level scope of a module.
    pub(crate) fn root_scope(&self, module: ModuleId) -> Rc<Scope<'c>> {
        let parsed = &self.entries[module.to_index()].parsed;
        Rc::new(Scope {
            module,
            typedefs: &parsed.typedefs,
            groupings: &parsed.groupings,
            parent: None,
        })
    }

    pub(crate) fn module_name(&self, module: ModuleId) -> &'c str {
        &self.entries[module.to_index()].parsed.name
    }

    /// Resolve a prefix in the scope of a module.
    pub(crate) fn prefix_module(
        &self,
        module: ModuleId,
        prefix: &str,
    ) -> Option<ModuleId> {
        self.entries[module.to_index()]
            .prefixes
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, m)| *m)
    }

    /// Parse an XPath expression written in a module.
    pub(crate) fn parse_xpath(&self, module: ModuleId, text: &str) -> Result<Expr> {
        let resolver = |prefix: &str| self.prefix_module(module, prefix);
        xpath::parse(text, &resolver)
    }

    pub(crate) fn intern(&mut self, s: &str) -> Arc<str> {
        self.dict.intern(s)
    }

    pub(crate) fn intern_opt(&mut self, s: Option<&str>) -> Option<Arc<str>> {
        self.dict.intern_opt(s)
    }
}

/// Address of a parsed definition, used as identity key.
pub(crate) fn addr<T>(value: &T) -> usize {
    value as *const T as usize
}
