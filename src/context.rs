//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG context.

use bitflags::bitflags;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::compiled::CompiledSchema;
use crate::compiler;
use crate::data::DataTree;
use crate::dict::Dictionary;
use crate::error::{Error, ErrorCode, Result};
use crate::extension::{self, ExtensionInstance, ExtensionPlugin};
use crate::ids::ModuleId;
use crate::iter::{SchemaModules, Set};
use crate::logging::{self, DefaultLogger, ErrorRecord, LogCallback, LogLevel, LogSink};
use crate::modules;
use crate::parsed::ParsedModule;
use crate::parser::{self, Stmt};
use crate::schema::{self, SchemaInputFormat, SchemaModule, SchemaNode};
use crate::utils::{is_revision_date, split_prefix, Binding};

/// Context of the YANG schemas.
///
/// The context owns every loaded module and the compiled schema of the whole
/// module set. Schema handles and data trees borrow the context, so none of
/// them can outlive it.
pub struct Context {
    options: ContextFlags,
    searchdirs: Vec<PathBuf>,
    pub(crate) entries: Vec<ModuleEntry>,
    compiled: CompiledSchema,
    dict: Dictionary,
    sink: LogSink,
    plugins: Vec<Box<dyn ExtensionPlugin>>,
    import_callback: Option<Box<dyn ModuleImportCallback>>,
    module_set_id: u16,
    internal_count: usize,
}

/// A module of the context, as parsed, with the import resolution needed by
/// the compiler.
pub(crate) struct ModuleEntry {
    pub(crate) parsed: ParsedModule,
    /// Prefixes usable in the module text, its own prefix included.
    pub(crate) prefixes: Vec<(String, ModuleId)>,
    pub(crate) implemented: bool,
    /// Requested features, `*` for all of them.
    pub(crate) features: Vec<String>,
    pub(crate) filepath: Option<PathBuf>,
    /// Names of the included submodules.
    pub(crate) submodules: Vec<(String, Option<String>)>,
}

bitflags! {
    /// Options to change context behavior.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct ContextFlags: u16 {
        /// All the imported modules of the schema being parsed are implemented.
        const ALL_IMPLEMENTED = 0x01;

        /// Implement all imported modules "referenced" from an implemented
        /// module. Normally, leafrefs, augment and deviation targets are
        /// implemented as specified by YANG 1.1. In addition to this, implement
        /// any modules of nodes referenced by when and must conditions and by
        /// any default values. Generally, only if all these modules are
        /// implemented, the explicitly implemented modules can be properly
        /// used and instantiated in data.
        const REF_IMPLEMENTED = 0x02;

        /// Do not internally implement ietf-yang-library module. This option
        /// cannot be changed on existing context.
        const NO_YANGLIBRARY = 0x04;

        /// Do not search for schemas in context's searchdirs neither in current
        /// working directory.
        const DISABLE_SEARCHDIRS = 0x08;

        /// Do not automatically search for schemas in current working
        /// directory, which is by default searched automatically (despite not
        /// recursively).
        const DISABLE_SEARCHDIR_CWD = 0x10;

        /// When searching for schema, prefer searchdirs instead of the
        /// module import callback.
        const PREFER_SEARCHDIRS = 0x20;
    }
}

/// Supplier of module sources that are not found elsewhere.
///
/// Called with the module name and revision and, when a submodule is
/// requested, the submodule name and revision. Returns the module text and
/// its format.
pub trait ModuleImportCallback: Send + Sync {
    fn import(
        &self,
        module: &str,
        revision: Option<&str>,
        submodule: Option<&str>,
        submodule_revision: Option<&str>,
    ) -> Option<(String, SchemaInputFormat)>;
}

impl<F> ModuleImportCallback for F
where
    F: Fn(
        &str,
        Option<&str>,
        Option<&str>,
        Option<&str>,
    ) -> Option<(String, SchemaInputFormat)>
        + Send
        + Sync,
{
    fn import(
        &self,
        module: &str,
        revision: Option<&str>,
        submodule: Option<&str>,
        submodule_revision: Option<&str>,
    ) -> Option<(String, SchemaInputFormat)> {
        self(module, revision, submodule, submodule_revision)
    }
}

// Where a module source was found.
struct Source {
    text: String,
    format: SchemaInputFormat,
    filepath: Option<PathBuf>,
}

// ===== impl Context =====

impl Context {
    /// Create a new context.
    ///
    /// Context is used to hold all information about schemas. Usually, the
    /// application is supposed to work with a single context holding all
    /// schemas according to which the data trees will be processed and
    /// validated.
    pub fn new(options: ContextFlags) -> Result<Context> {
        Context::new_with_searchdirs::<&Path>(options, &[])
    }

    /// Create a new context with an initial list of search directories.
    pub fn new_with_searchdirs<P: AsRef<Path>>(
        options: ContextFlags,
        searchdirs: &[P],
    ) -> Result<Context> {
        if options.contains(ContextFlags::DISABLE_SEARCHDIRS)
            && options.contains(ContextFlags::PREFER_SEARCHDIRS)
        {
            return Err(Error::new(
                ErrorCode::ContextCreation,
                "Options DISABLE_SEARCHDIRS and PREFER_SEARCHDIRS conflict.",
            ));
        }

        let mut context = Context {
            options,
            searchdirs: Vec::new(),
            entries: Vec::new(),
            compiled: CompiledSchema::default(),
            dict: Dictionary::new(),
            sink: LogSink::new(),
            plugins: Vec::new(),
            import_callback: None,
            module_set_id: 0,
            internal_count: 0,
        };
        for dir in searchdirs {
            context.set_searchdir(dir).map_err(|err| {
                Error::new(ErrorCode::ContextCreation, err.to_string())
            })?;
        }

        for (name, revision, text) in modules::INTERNAL {
            let yanglib = matches!(*name, "ietf-datastores" | "ietf-yang-library");
            if yanglib && options.contains(ContextFlags::NO_YANGLIBRARY) {
                continue;
            }
            context.sink.debug(format!(
                "Loading internal module \"{}@{}\".",
                name, revision
            ));
            let source = Source {
                text: (*text).to_owned(),
                format: SchemaInputFormat::YANG,
                filepath: None,
            };
            context
                .transaction(|ctx| ctx.add_source(source, true, &[], &mut Vec::new()))
                .map_err(|err| {
                    Error::new(
                        ErrorCode::ContextCreation,
                        format!("Failed to load internal module \"{}\": {}", name, err),
                    )
                })?;
        }
        context.internal_count = context.entries.len();

        Ok(context)
    }

    /// Destroy the context. All the schema handles and data trees obtained
    /// from it must have been dropped already, which the borrow checker
    /// enforces.
    pub fn destroy(self) {}

    pub(crate) fn compiled(&self) -> &CompiledSchema {
        &self.compiled
    }

    pub(crate) fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub(crate) fn entry(&self, id: ModuleId) -> &ModuleEntry {
        &self.entries[id.to_index()]
    }

    pub(crate) fn module_count(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_internal_module(&self, id: ModuleId) -> bool {
        id.to_index() < self.internal_count
    }

    /// Add the search path into the context. Adding a path already present
    /// is a no-op.
    pub fn set_searchdir<P: AsRef<Path>>(&mut self, search_dir: P) -> Result<()> {
        let dir = search_dir.as_ref();
        if !dir.is_dir() {
            return Err(self.sink.error(Error::not_found(format!(
                "Search directory \"{}\" does not exist.",
                dir.display()
            ))));
        }
        if !self.searchdirs.iter().any(|d| d == dir) {
            self.searchdirs.push(dir.to_path_buf());
        }

        Ok(())
    }

    /// Clean the search path from the context.
    ///
    /// To remove the recently added search path(s), use
    /// Context::unset_searchdir_last().
    pub fn unset_searchdir<P: AsRef<Path>>(&mut self, search_dir: P) -> Result<()> {
        let dir = search_dir.as_ref();
        match self.searchdirs.iter().position(|d| d == dir) {
            Some(pos) => {
                self.searchdirs.remove(pos);
                Ok(())
            }
            None => Err(self.sink.error(Error::not_found(format!(
                "Search directory \"{}\" is not set.",
                dir.display()
            )))),
        }
    }

    /// Clean all search paths from the context.
    pub fn unset_searchdirs(&mut self) {
        self.searchdirs.clear();
    }

    /// Remove the least recently added search path(s) from the context.
    ///
    /// To remove a specific search path by its value, use
    /// Context::unset_searchdir().
    pub fn unset_searchdir_last(&mut self, count: usize) {
        let len = self.searchdirs.len().saturating_sub(count);
        self.searchdirs.truncate(len);
    }

    /// Configured search directories, in search order.
    pub fn searchdirs(&self) -> impl Iterator<Item = &Path> {
        self.searchdirs.iter().map(PathBuf::as_path)
    }

    /// Get the currently set context's options.
    pub fn get_options(&self) -> ContextFlags {
        self.options
    }

    /// Set some of the context's options.
    pub fn set_options(&mut self, options: ContextFlags) -> Result<()> {
        self.change_options(self.options | options, options)
    }

    /// Unset some of the context's options.
    pub fn unset_options(&mut self, options: ContextFlags) -> Result<()> {
        self.change_options(self.options - options, options)
    }

    fn change_options(
        &mut self,
        new: ContextFlags,
        changed: ContextFlags,
    ) -> Result<()> {
        if changed.contains(ContextFlags::NO_YANGLIBRARY) {
            return Err(self.sink.error(Error::new(
                ErrorCode::Native,
                "Option NO_YANGLIBRARY cannot be changed on an existing context.",
            )));
        }
        if new.contains(ContextFlags::DISABLE_SEARCHDIRS | ContextFlags::PREFER_SEARCHDIRS) {
            return Err(self.sink.error(Error::new(
                ErrorCode::Native,
                "Options DISABLE_SEARCHDIRS and PREFER_SEARCHDIRS conflict.",
            )));
        }
        let old = self.options;
        self.options = new;
        // Implementing more modules changes the compiled schema.
        let implements = ContextFlags::ALL_IMPLEMENTED | ContextFlags::REF_IMPLEMENTED;
        if (old & implements) != (new & implements) {
            if let Err(err) = self.transaction(|_| Ok(())) {
                self.options = old;
                return Err(err);
            }
        }

        Ok(())
    }

    /// Get current ID of the modules set.
    pub fn get_module_set_id(&self) -> u16 {
        self.module_set_id
    }

    /// Get YANG module of the given name and revision.
    ///
    /// If the revision is not specified, the schema with no revision is
    /// returned (if it is present in the context).
    pub fn get_module(
        &self,
        name: &str,
        revision: Option<&str>,
    ) -> Option<SchemaModule<'_>> {
        self.find_entry(|e| e.parsed.name == name && e.parsed.revision() == revision)
    }

    /// Get the latest revision of the YANG module specified by its name.
    ///
    /// YANG modules with no revision are supposed to be the oldest one.
    pub fn get_module_latest(&self, name: &str) -> Option<SchemaModule<'_>> {
        self.latest_entry(|e| e.parsed.name == name)
    }

    /// Get the (only) implemented YANG module specified by its name.
    pub fn get_module_implemented(&self, name: &str) -> Option<SchemaModule<'_>> {
        self.find_entry(|e| e.parsed.name == name && e.implemented)
    }

    /// YANG module of the given namespace and revision.
    ///
    /// If the revision is not specified, the schema with no revision is
    /// returned (if it is present in the context).
    pub fn get_module_ns(
        &self,
        ns: &str,
        revision: Option<&str>,
    ) -> Option<SchemaModule<'_>> {
        self.find_entry(|e| e.parsed.namespace == ns && e.parsed.revision() == revision)
    }

    /// Get the latest revision of the YANG module specified by its namespace.
    ///
    /// YANG modules with no revision are supposed to be the oldest one.
    pub fn get_module_latest_ns(&self, ns: &str) -> Option<SchemaModule<'_>> {
        self.latest_entry(|e| e.parsed.namespace == ns)
    }

    /// Get the (only) implemented YANG module specified by its namespace.
    pub fn get_module_implemented_ns(&self, ns: &str) -> Option<SchemaModule<'_>> {
        self.find_entry(|e| e.parsed.namespace == ns && e.implemented)
    }

    fn find_entry(
        &self,
        pred: impl Fn(&ModuleEntry) -> bool,
    ) -> Option<SchemaModule<'_>> {
        self.entries
            .iter()
            .position(pred)
            .map(|index| SchemaModule::from_id(self, ModuleId::from_index(index)))
    }

    fn latest_entry(
        &self,
        pred: impl Fn(&ModuleEntry) -> bool,
    ) -> Option<SchemaModule<'_>> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| pred(e))
            .max_by(|(_, a), (_, b)| a.parsed.revision().cmp(&b.parsed.revision()))
            .map(|(index, _)| SchemaModule::from_id(self, ModuleId::from_index(index)))
    }

    /// Get list of loaded modules.
    ///
    /// Internal modules (loaded during the context creation) can be skipped.
    pub fn modules(&self, skip_internal: bool) -> SchemaModules<'_> {
        SchemaModules::new(self, skip_internal)
    }

    /// Returns an iterator over all data nodes from all modules in the YANG
    /// context (depth-first search algorithm).
    pub fn traverse(&self) -> impl Iterator<Item = SchemaNode<'_>> {
        self.modules(false).flat_map(|module| module.traverse())
    }

    /// Learn the number of internal modules of the context. Internal modules is
    /// considered one that was loaded during the context creation.
    pub fn internal_module_count(&self) -> u32 {
        self.internal_count as u32
    }

    /// Parse a module from a string and add it to the context, implemented.
    ///
    /// The features to enable are given by name, `*` enables all of them.
    pub fn parse_module(
        &mut self,
        source: &str,
        format: SchemaInputFormat,
        features: &[&str],
    ) -> Result<SchemaModule<'_>> {
        let source = Source {
            text: source.to_owned(),
            format,
            filepath: None,
        };
        let id = self.transaction(|ctx| ctx.add_source(source, true, features, &mut Vec::new()))?;
        Ok(SchemaModule::from_id(self, id))
    }

    /// Parse a module from a file and add it to the context, implemented.
    pub fn parse_module_file<P: AsRef<Path>>(
        &mut self,
        path: P,
        format: SchemaInputFormat,
        features: &[&str],
    ) -> Result<SchemaModule<'_>> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            self.sink.error(Error::new(
                ErrorCode::ModuleNotFound,
                format!("Failed to read \"{}\": {}", path.display(), err),
            ))
        })?;
        let source = Source {
            text,
            format,
            filepath: Some(path.to_path_buf()),
        };
        let id = self.transaction(|ctx| ctx.add_source(source, true, features, &mut Vec::new()))?;
        Ok(SchemaModule::from_id(self, id))
    }

    /// Parse a module into its parsed schema tree only. The context is left
    /// unchanged: imports are neither resolved nor compiled.
    pub fn parse_module_parsed_only(
        &self,
        source: &str,
        format: SchemaInputFormat,
    ) -> Result<ParsedModule> {
        parser::parse_stmt(source, format)
            .and_then(ParsedModule::from_stmt)
            .map_err(|err| self.sink.error(err))
    }

    /// Try to find the model in the searchpaths and load it.
    ///
    /// The context itself is searched for the requested module first. If
    /// revision is not specified (the module of the latest revision is
    /// requested) and there is implemented revision of the requested module
    /// in the context, this implemented revision is returned despite there
    /// might be a newer revision. This behavior is caused by the fact that
    /// it is not possible to have multiple implemented revisions of
    /// the same module in the context.
    ///
    /// If the revision is not specified, the latest revision is loaded.
    pub fn load_module(
        &mut self,
        name: &str,
        revision: Option<&str>,
        features: &[&str],
    ) -> Result<SchemaModule<'_>> {
        let id = self.transaction(|ctx| {
            if let Some(id) = ctx.lookup(name, revision, true) {
                ctx.implement(id, features)?;
                return Ok(id);
            }
            let source = ctx.find_source(name, revision, None)?;
            ctx.add_source(source, true, features, &mut Vec::new())
        })?;
        Ok(SchemaModule::from_id(self, id))
    }

    /// Make an imported module implemented.
    pub fn set_implemented(
        &mut self,
        name: &str,
        revision: Option<&str>,
    ) -> Result<SchemaModule<'_>> {
        let id = self.transaction(|ctx| {
            let id = ctx.lookup(name, revision, false).ok_or_else(|| {
                Error::not_found(format!("Module \"{}\" not found in the context.", name))
            })?;
            ctx.implement(id, &[])?;
            Ok(id)
        })?;
        Ok(SchemaModule::from_id(self, id))
    }

    /// Enable a feature of an implemented module.
    pub fn feature_enable(&mut self, module: &str, feature: &str) -> Result<()> {
        self.change_features(module, Some(feature), |features, feature| {
            if let Some(feature) = feature {
                if !features.iter().any(|f| f == "*" || f == feature) {
                    features.push(feature.to_owned());
                }
            }
        })
    }

    /// Disable a feature of an implemented module.
    pub fn feature_disable(&mut self, module: &str, feature: &str) -> Result<()> {
        let all = self.feature_names(module)?;
        self.change_features(module, Some(feature), move |features, feature| {
            if features.iter().any(|f| f == "*") {
                *features = all;
            }
            features.retain(|f| Some(f.as_str()) != feature);
        })
    }

    /// Enable all features of an implemented module.
    pub fn feature_enable_all(&mut self, module: &str) -> Result<()> {
        self.change_features(module, None, |features, _| {
            *features = vec!["*".to_owned()];
        })
    }

    /// Disable all features of an implemented module.
    pub fn feature_disable_all(&mut self, module: &str) -> Result<()> {
        self.change_features(module, None, |features, _| features.clear())
    }

    fn feature_names(&self, module: &str) -> Result<Vec<String>> {
        let id = self.implemented_id(module)?;
        Ok(self
            .entry(id)
            .parsed
            .features
            .iter()
            .map(|f| f.name.clone())
            .collect())
    }

    fn implemented_id(&self, module: &str) -> Result<ModuleId> {
        self.entries
            .iter()
            .position(|e| e.parsed.name == module && e.implemented)
            .map(ModuleId::from_index)
            .ok_or_else(|| {
                self.sink.error(Error::not_found(format!(
                    "Implemented module \"{}\" not found.",
                    module
                )))
            })
    }

    fn change_features(
        &mut self,
        module: &str,
        feature: Option<&str>,
        f: impl FnOnce(&mut Vec<String>, Option<&str>),
    ) -> Result<()> {
        let id = self.implemented_id(module)?;
        if let Some(feature) = feature {
            if !self.entry(id).parsed.features.iter().any(|f| f.name == feature) {
                return Err(self.sink.error(Error::not_found(format!(
                    "Feature \"{}\" not found in module \"{}\".",
                    feature, module
                ))));
            }
        }
        self.transaction(|ctx| {
            f(&mut ctx.entries[id.to_index()].features, feature);
            Ok(())
        })
    }

    /// Get a schema node based on the given data path (JSON format).
    pub fn find_path(&self, path: &str) -> Result<SchemaNode<'_>> {
        self.find_xpath(path)?.next().ok_or_else(|| {
            self.sink.error(Error::not_found(format!(
                "Schema node \"{}\" not found.",
                path
            )))
        })
    }

    /// Get the schema nodes matching the given XPath expression.
    pub fn find_xpath(&self, path: &str) -> Result<Set<'_, SchemaNode<'_>>> {
        let output = false;
        let ids = schema::find_schema_nodes(self, path, output)?;
        Ok(Set::new(
            ids.into_iter()
                .map(|id| SchemaNode::from_id(self, id))
                .collect(),
        ))
    }

    /// Resolve a schema path against all implemented modules. With
    /// `required` set, no match is a `NotFound` error.
    pub fn find_schema_path(
        &self,
        path: &str,
        required: bool,
    ) -> Result<Vec<SchemaNode<'_>>> {
        let nodes: Vec<_> = self.find_xpath(path)?.collect();
        if nodes.is_empty() && required {
            return Err(self.sink.error(Error::not_found(format!(
                "Schema path \"{}\" matches no node.",
                path
            ))));
        }
        Ok(nodes)
    }

    /// Register an extension plugin. Plugins registered before a module is
    /// loaded see all of its extension instances.
    pub fn register_extension_plugin(&mut self, plugin: Box<dyn ExtensionPlugin>) {
        self.plugins.push(plugin);
    }

    /// Set the callback providing module sources not found in the
    /// search directories.
    pub fn set_module_import_callback<C>(&mut self, callback: C)
    where
        C: ModuleImportCallback + 'static,
    {
        self.import_callback = Some(Box::new(callback));
    }

    /// Remove the module import callback.
    pub fn unset_module_import_callback(&mut self) {
        self.import_callback = None;
    }

    /// Set the log callback of this context.
    pub fn set_log_callback<C: LogCallback>(&mut self, callback: C) {
        self.sink.set_callback(Box::new(callback));
    }

    /// Forward the diagnostics of this context to the `log` crate.
    pub fn init_default_logger(&mut self) {
        self.set_log_callback(DefaultLogger::default());
    }

    /// Set the log level of this context. Returns the previous level.
    pub fn set_log_level(&mut self, level: LogLevel) -> LogLevel {
        let old = self.sink.level();
        self.sink.set_level(level);
        old
    }

    /// Drain the pending errors and warnings, most recent first.
    pub fn errors(&self) -> Vec<ErrorRecord> {
        self.sink.drain()
    }

    /// Drain the pending diagnostics into a single error.
    pub fn error(&self, msg: &str) -> Error {
        let records = self.sink.drain();
        let mut err = Error::new(ErrorCode::Native, logging::format_records(msg, &records));
        if let Some(first) = records.first() {
            err.path = first.data_path.clone().or_else(|| first.schema_path.clone());
            err.apptag = first.apptag.clone();
        }
        err
    }

    /// Build the ietf-yang-library data describing the module set.
    pub fn get_yanglib_data(&self) -> Result<DataTree<'_>> {
        const LIB: &str = "/ietf-yang-library:yang-library";
        const SET: &str = "/ietf-yang-library:yang-library/module-set[name='complete']";

        if self.get_module_implemented("ietf-yang-library").is_none() {
            return Err(self.sink.error(Error::not_found(
                "Module \"ietf-yang-library\" is not implemented.",
            )));
        }

        let mut tree = DataTree::new(self);
        tree.new_path(SET, None, false)?;
        for (index, entry) in self.entries.iter().enumerate() {
            let module = self.compiled.module(ModuleId::from_index(index));
            let parsed = &entry.parsed;
            let revision = parsed.revision().unwrap_or_default();
            let base = if entry.implemented {
                format!("{}/module[name='{}']", SET, parsed.name)
            } else {
                format!(
                    "{}/import-only-module[name='{}'][revision='{}']",
                    SET, parsed.name, revision
                )
            };
            tree.new_path(&base, None, false)?;
            if entry.implemented && !revision.is_empty() {
                tree.new_path(&format!("{}/revision", base), Some(revision), false)?;
            }
            tree.new_path(&format!("{}/namespace", base), Some(&parsed.namespace), false)?;
            if let Some(path) = entry.filepath.as_deref().and_then(Path::to_str) {
                tree.new_path(
                    &format!("{}/location[.='file://{}']", base, path),
                    None,
                    false,
                )?;
            }
            for (submodule, subrev) in &entry.submodules {
                let sub = format!("{}/submodule[name='{}']", base, submodule);
                tree.new_path(&sub, None, false)?;
                if let Some(subrev) = subrev {
                    tree.new_path(&format!("{}/revision", sub), Some(subrev), false)?;
                }
            }
            if entry.implemented {
                for (feature, enabled) in &module.features {
                    if *enabled {
                        tree.new_path(
                            &format!("{}/feature[.='{}']", base, feature),
                            None,
                            false,
                        )?;
                    }
                }
                for deviator in &module.deviated_by {
                    let name = &self.compiled.module(*deviator).name;
                    tree.new_path(&format!("{}/deviation[.='{}']", base, name), None, false)?;
                }
            }
        }

        let schema = format!("{}/schema[name='complete']", LIB);
        tree.new_path(&format!("{}/module-set[.='complete']", schema), None, false)?;
        for datastore in ["running", "intended", "operational"] {
            tree.new_path(
                &format!(
                    "{}/datastore[name='ietf-datastores:{}']/schema",
                    LIB, datastore
                ),
                Some("complete"),
                false,
            )?;
        }
        tree.new_path(
            &format!("{}/content-id", LIB),
            Some(&self.module_set_id.to_string()),
            false,
        )?;

        Ok(tree)
    }

    // ===== module loading =====

    /// Run a change of the module set and recompile. On failure the module
    /// set is restored as it was.
    fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Context) -> Result<T>,
    ) -> Result<T> {
        let len = self.entries.len();
        let saved: Vec<(bool, Vec<String>)> = self
            .entries
            .iter()
            .map(|e| (e.implemented, e.features.clone()))
            .collect();

        match f(self).and_then(|value| self.recompile().map(|_| value)) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.entries.truncate(len);
                for (entry, (implemented, features)) in self.entries.iter_mut().zip(saved) {
                    entry.implemented = implemented;
                    entry.features = features;
                }
                Err(self.sink.error(err))
            }
        }
    }

    fn recompile(&mut self) -> Result<()> {
        let compiled = compiler::compile(
            &self.entries,
            &mut self.dict,
            &self.sink,
            &self.plugins,
            self.options,
        )?;
        let old = std::mem::replace(&mut self.compiled, compiled.schema);
        self.free_ext_data(&old);

        for (entry, implemented) in self.entries.iter_mut().zip(compiled.implemented) {
            if implemented && !entry.implemented {
                self.sink.verbose(format!(
                    "Implemented module \"{}\" referenced by another module.",
                    entry.parsed.name
                ));
            }
            entry.implemented = implemented;
        }
        self.module_set_id = self.module_set_id.wrapping_add(1);
        Ok(())
    }

    // Hand the plugin data of a compiled schema back to the plugins.
    fn free_ext_data(&self, schema: &CompiledSchema) {
        let exts = schema
            .modules
            .iter()
            .flat_map(|m| m.exts.iter())
            .chain(schema.nodes.iter().flat_map(|n| n.exts.iter()));
        for ext in exts {
            let Some(data) = &ext.data else {
                continue;
            };
            let module = &schema.module(ext.module).name;
            if let Some(plugin) = extension::find_plugin(&self.plugins, module, &ext.name) {
                plugin.free(data);
            }
        }
    }

    /// Find a module already in the context. Without revision the
    /// implemented one is preferred, then the latest.
    fn lookup(&self, name: &str, revision: Option<&str>, implemented_first: bool) -> Option<ModuleId> {
        let candidates = || {
            self.entries
                .iter()
                .enumerate()
                .filter(move |(_, e)| e.parsed.name == name)
        };
        let found = match revision {
            Some(revision) => candidates().find(|(_, e)| e.parsed.revision() == Some(revision)),
            None => candidates()
                .find(|(_, e)| implemented_first && e.implemented)
                .or_else(|| {
                    candidates().max_by(|(_, a), (_, b)| a.parsed.revision().cmp(&b.parsed.revision()))
                }),
        };
        found.map(|(index, _)| ModuleId::from_index(index))
    }

    fn implement(&mut self, id: ModuleId, features: &[&str]) -> Result<()> {
        let name = self.entry(id).parsed.name.clone();
        if let Some(other) = self
            .entries
            .iter()
            .enumerate()
            .find(|(index, e)| *index != id.to_index() && e.parsed.name == name && e.implemented)
        {
            return Err(Error::compile(format!(
                "Module \"{}\" is already implemented in revision \"{}\".",
                name,
                other.1.parsed.revision().unwrap_or("none")
            )));
        }
        let entry = &mut self.entries[id.to_index()];
        entry.implemented = true;
        if !features.is_empty() {
            entry.features = features.iter().map(|f| (*f).to_owned()).collect();
        }
        Ok(())
    }

    /// Parse a module source and add it with its imports and includes.
    fn add_source(
        &mut self,
        source: Source,
        implement: bool,
        features: &[&str],
        stack: &mut Vec<String>,
    ) -> Result<ModuleId> {
        let stmt = parser::parse_stmt(&source.text, source.format)?;
        let mut parsed = ParsedModule::from_stmt(stmt)?;
        if parsed.is_submodule {
            return Err(Error::syntax(format!(
                "Input data contains submodule \"{}\" which cannot be parsed directly without its main module.",
                parsed.name
            )));
        }
        self.run_parse_hooks(&parsed)?;

        if let Some(id) = self.lookup(&parsed.name, parsed.revision(), false) {
            if self.entry(id).parsed.revision() == parsed.revision() {
                if implement {
                    self.implement(id, features)?;
                }
                return Ok(id);
            }
        }
        if implement {
            if let Some(other) = self.entries.iter().find(|e| e.parsed.name == parsed.name && e.implemented) {
                return Err(Error::compile(format!(
                    "Module \"{}\" is already implemented in revision \"{}\".",
                    parsed.name,
                    other.parsed.revision().unwrap_or("none")
                )));
            }
        }
        self.sink.debug(format!(
            "Adding module \"{}\"{}.",
            parsed.name,
            parsed.revision().map(|r| format!(" revision {}", r)).unwrap_or_default()
        ));

        stack.push(parsed.name.clone());
        let result = self.resolve_dependencies(&mut parsed, stack);
        stack.pop();
        let (prefixes, submodules) = result?;

        let id = ModuleId::from_index(self.entries.len());
        let mut entry = ModuleEntry {
            prefixes,
            implemented: implement,
            features: features.iter().map(|f| (*f).to_owned()).collect(),
            filepath: source.filepath,
            submodules,
            parsed,
        };
        entry.prefixes.push((entry.parsed.prefix.clone(), id));
        self.entries.push(entry);
        Ok(id)
    }

    #[allow(clippy::type_complexity)]
    fn resolve_dependencies(
        &mut self,
        parsed: &mut ParsedModule,
        stack: &mut Vec<String>,
    ) -> Result<(Vec<(String, ModuleId)>, Vec<(String, Option<String>)>)> {
        let mut submodules = Vec::new();
        self.include_submodules(parsed, &mut submodules)?;

        let mut prefixes = Vec::new();
        for import in parsed.imports.clone() {
            if import.module == parsed.name {
                return Err(Error::new(
                    ErrorCode::CyclicDefinition,
                    format!("Module \"{}\" imports itself.", parsed.name),
                ));
            }
            let id = self.import(&import.module, import.revision.as_deref(), stack)?;
            if !prefixes.iter().any(|(p, _)| *p == import.prefix) {
                prefixes.push((import.prefix.clone(), id));
            }
        }
        Ok((prefixes, submodules))
    }

    /// Resolve an imported module: from the context or from a new source.
    fn import(
        &mut self,
        name: &str,
        revision: Option<&str>,
        stack: &mut Vec<String>,
    ) -> Result<ModuleId> {
        if let Some(id) = self.lookup(name, revision, true) {
            return Ok(id);
        }
        if stack.iter().any(|m| m == name) {
            return Err(Error::new(
                ErrorCode::CyclicDefinition,
                format!(
                    "Cyclic import of module \"{}\" ({} -> {}).",
                    name,
                    stack.join(" -> "),
                    name
                ),
            ));
        }
        let source = self.find_source(name, revision, None)?;
        let implement = self.options.contains(ContextFlags::ALL_IMPLEMENTED);
        let id = self.add_source(source, implement, &[], stack)?;
        if let Some(revision) = revision {
            if self.entry(id).parsed.revision() != Some(revision) {
                return Err(Error::new(
                    ErrorCode::ModuleNotFound,
                    format!("Module \"{}@{}\" not found.", name, revision),
                ));
            }
        }
        Ok(id)
    }

    /// Merge the definitions of all (nested) included submodules.
    fn include_submodules(
        &mut self,
        parsed: &mut ParsedModule,
        done: &mut Vec<(String, Option<String>)>,
    ) -> Result<()> {
        let mut pending: Vec<_> = parsed.includes.clone();
        while let Some(include) = pending.pop() {
            if done.iter().any(|(name, _)| *name == include.submodule) {
                continue;
            }
            let source = self.find_source(
                &parsed.name,
                parsed.revision().map(str::to_owned).as_deref(),
                Some((&include.submodule, include.revision.as_deref())),
            )?;
            let stmt = parser::parse_stmt(&source.text, source.format)?;
            let sub = ParsedModule::from_stmt(stmt)?;
            if !sub.is_submodule || sub.belongs_to.as_deref() != Some(parsed.name.as_str()) {
                return Err(Error::syntax(format!(
                    "Included \"{}\" is not a submodule of module \"{}\".",
                    include.submodule, parsed.name
                )));
            }
            self.run_parse_hooks(&sub)?;
            self.sink.debug(format!(
                "Including submodule \"{}\" into module \"{}\".",
                sub.name, parsed.name
            ));
            done.push((sub.name.clone(), sub.revision().map(str::to_owned)));
            pending.extend(sub.includes.iter().cloned());
            merge_submodule(parsed, sub);
        }
        Ok(())
    }

    /// Locate the text of a module (or of one of its submodules).
    fn find_source(
        &self,
        module: &str,
        revision: Option<&str>,
        submodule: Option<(&str, Option<&str>)>,
    ) -> Result<Source> {
        let (name, name_rev) = match submodule {
            Some((sub, rev)) => (sub, rev),
            None => (module, revision),
        };

        if let Some(text) = modules::find(name, name_rev) {
            return Ok(Source {
                text: text.to_owned(),
                format: SchemaInputFormat::YANG,
                filepath: None,
            });
        }

        let from_callback = || {
            let callback = self.import_callback.as_ref()?;
            let (sub, sub_rev) = match submodule {
                Some((sub, rev)) => (Some(sub), rev),
                None => (None, None),
            };
            callback
                .import(module, revision, sub, sub_rev)
                .map(|(text, format)| Source {
                    text,
                    format,
                    filepath: None,
                })
        };
        let source = if self.options.contains(ContextFlags::PREFER_SEARCHDIRS) {
            self.search_dirs(name, name_rev).or_else(from_callback)
        } else {
            from_callback().or_else(|| self.search_dirs(name, name_rev))
        };

        source.ok_or_else(|| {
            Error::new(
                ErrorCode::ModuleNotFound,
                match name_rev {
                    Some(rev) => format!("Data model \"{}@{}\" not found.", name, rev),
                    None => format!("Data model \"{}\" not found.", name),
                },
            )
        })
    }

    /// Search the directories for `name[@revision].{yang,yin}`. Without a
    /// requested revision the file with the latest revision wins.
    fn search_dirs(&self, name: &str, revision: Option<&str>) -> Option<Source> {
        if self.options.contains(ContextFlags::DISABLE_SEARCHDIRS) {
            return None;
        }

        let mut candidates: Vec<(PathBuf, Option<String>, SchemaInputFormat)> = Vec::new();
        let mut visit = |path: &Path| {
            if let Some((rev, format)) = match_file_name(path, name) {
                candidates.push((path.to_path_buf(), rev, format));
            }
        };
        for dir in &self.searchdirs {
            self.sink.debug(format!("Searching for \"{}\" in {}.", name, dir.display()));
            for entry in WalkDir::new(dir).follow_links(true).into_iter().flatten() {
                if entry.file_type().is_file() {
                    visit(entry.path());
                }
            }
        }
        if !self.options.contains(ContextFlags::DISABLE_SEARCHDIR_CWD) {
            for entry in WalkDir::new(".").max_depth(1).into_iter().flatten() {
                if entry.file_type().is_file() {
                    visit(entry.path());
                }
            }
        }

        let chosen = match revision {
            Some(revision) => candidates
                .iter()
                .find(|(_, rev, _)| rev.as_deref() == Some(revision))
                .or_else(|| candidates.iter().find(|(_, rev, _)| rev.is_none())),
            None => candidates.iter().max_by(|a, b| a.1.cmp(&b.1)),
        }?;

        let (path, _, format) = chosen;
        match std::fs::read_to_string(path) {
            Ok(text) => Some(Source {
                text,
                format: *format,
                filepath: Some(path.clone()),
            }),
            Err(err) => {
                self.sink.warn(
                    format!("Failed to read \"{}\": {}", path.display(), err),
                    None,
                );
                None
            }
        }
    }

    /// Call the parse hook of the registered plugins for every extension
    /// instance of a (sub)module.
    fn run_parse_hooks(&self, parsed: &ParsedModule) -> Result<()> {
        if self.plugins.is_empty() {
            return Ok(());
        }
        let mut path = Vec::new();
        self.parse_hooks_stmt(parsed, &parsed.stmt, &mut path)
    }

    fn parse_hooks_stmt(
        &self,
        parsed: &ParsedModule,
        stmt: &Stmt,
        path: &mut Vec<String>,
    ) -> Result<()> {
        for sub in &stmt.substmts {
            if sub.is_extension() {
                let (prefix, name) = split_prefix(&sub.keyword);
                let module = match prefix {
                    Some(prefix) if prefix == parsed.prefix => Some(parsed.name.as_str()),
                    Some(prefix) => parsed
                        .imports
                        .iter()
                        .find(|i| i.prefix == prefix)
                        .map(|i| i.module.as_str()),
                    None => None,
                };
                let Some(module) = module else {
                    continue;
                };
                if let Some(plugin) = extension::find_plugin(&self.plugins, module, name) {
                    let ext_path = format!("/{}:{}", parsed.name, path.join("/"));
                    let ext = ExtensionInstance::new(
                        module,
                        name,
                        sub.arg.as_deref(),
                        &sub.substmts,
                        Some(ext_path),
                    );
                    extension::hook_result(plugin, plugin.parse(&ext))?;
                }
                continue;
            }
            let named = matches!(
                sub.keyword.as_str(),
                "container" | "leaf" | "leaf-list" | "list" | "choice" | "case"
                    | "anydata" | "anyxml" | "rpc" | "action" | "notification"
                    | "grouping" | "input" | "output"
            );
            if named {
                path.push(sub.arg.clone().unwrap_or_else(|| sub.keyword.clone()));
            }
            let result = self.parse_hooks_stmt(parsed, sub, path);
            if named {
                path.pop();
            }
            result?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("options", &self.options)
            .field("searchdirs", &self.searchdirs)
            .field(
                "modules",
                &self
                    .entries
                    .iter()
                    .map(|e| e.parsed.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .field("module_set_id", &self.module_set_id)
            .finish()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.free_ext_data(&self.compiled);
    }
}

/// Split a `PATH`-style environment variable into search directories.
pub fn searchdirs_from_env(var: &str) -> Vec<PathBuf> {
    match std::env::var_os(var) {
        Some(value) => std::env::split_paths(&value)
            .filter(|p| !p.as_os_str().is_empty())
            .collect(),
        None => Vec::new(),
    }
}

// `name.yang`, `name@rev.yang` and the YIN equivalents.
fn match_file_name(
    path: &Path,
    name: &str,
) -> Option<(Option<String>, SchemaInputFormat)> {
    let format = match path.extension()?.to_str()? {
        "yang" => SchemaInputFormat::YANG,
        "yin" => SchemaInputFormat::YIN,
        _ => return None,
    };
    let stem = path.file_stem()?.to_str()?;
    match stem.split_once('@') {
        Some((module, rev)) if module == name && is_revision_date(rev) => {
            Some((Some(rev.to_owned()), format))
        }
        None if stem == name => Some((None, format)),
        _ => None,
    }
}

// Definitions of a submodule become part of the including module.
fn merge_submodule(parsed: &mut ParsedModule, sub: ParsedModule) {
    for import in sub.imports {
        if !parsed.imports.iter().any(|i| i.module == import.module) {
            parsed.imports.push(import);
        }
    }
    parsed.extensions.extend(sub.extensions);
    parsed.features.extend(sub.features);
    parsed.identities.extend(sub.identities);
    parsed.typedefs.extend(sub.typedefs);
    parsed.groupings.extend(sub.groupings);
    parsed.body.extend(sub.body);
    parsed.augments.extend(sub.augments);
    parsed.deviations.extend(sub.deviations);
    parsed.exts.extend(sub.exts);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        let yang = Path::new("/tmp/ietf-interfaces@2018-02-20.yang");
        assert_eq!(
            match_file_name(yang, "ietf-interfaces"),
            Some((Some("2018-02-20".to_owned()), SchemaInputFormat::YANG))
        );
        let yin = Path::new("ietf-interfaces.yin");
        assert_eq!(
            match_file_name(yin, "ietf-interfaces"),
            Some((None, SchemaInputFormat::YIN))
        );
        assert_eq!(match_file_name(yin, "ietf-ip"), None);
        assert_eq!(match_file_name(Path::new("ietf-ip.txt"), "ietf-ip"), None);
    }

    #[test]
    fn option_conflict() {
        let err = Context::new(
            ContextFlags::DISABLE_SEARCHDIRS | ContextFlags::PREFER_SEARCHDIRS,
        )
        .unwrap_err();
        assert_eq!(err.errcode, ErrorCode::ContextCreation);
    }
}
