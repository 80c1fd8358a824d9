//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! YANG extension plugins.
//!
//! A plugin is identified by the name of the module defining the extension
//! and the extension name. Its hooks are called for every instance of the
//! extension: `parse` when a module carrying it is parsed, `compile` when the
//! module set is compiled and `free` when the compiled data is released.

use std::any::Any;
use std::sync::Arc;

use crate::error::{Error, ErrorCode, Result};
use crate::parser::Stmt;

/// Outcome of a plugin hook.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PluginStatus {
    Success,
    OutOfMemory,
    InvalidInput,
    NotValid,
    Denied,
    /// The hook does not handle this instance.
    NotApplicable,
}

/// Error returned by a plugin hook.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtensionError {
    pub status: PluginStatus,
    pub message: String,
}

/// Data attached to a compiled extension instance by a plugin.
pub type ExtensionData = Arc<dyn Any + Send + Sync>;

/// Extension instance as seen by a plugin hook.
#[derive(Debug)]
pub struct ExtensionInstance<'a> {
    module: &'a str,
    name: &'a str,
    argument: Option<&'a str>,
    substmts: &'a [Stmt],
    path: Option<String>,
    data: Option<ExtensionData>,
}

/// Extension plugin.
pub trait ExtensionPlugin: Send + Sync {
    /// Name of the module defining the extension.
    fn module(&self) -> &str;

    /// Name of the extension.
    fn name(&self) -> &str;

    /// Called for each instance when a module is parsed.
    fn parse(
        &self,
        _ext: &ExtensionInstance<'_>,
    ) -> std::result::Result<(), ExtensionError> {
        Ok(())
    }

    /// Called for each instance when the module set is compiled.
    fn compile(
        &self,
        _ext: &mut ExtensionInstance<'_>,
    ) -> std::result::Result<(), ExtensionError> {
        Ok(())
    }

    /// Called when data stored by `compile` is released.
    fn free(&self, _data: &ExtensionData) {}
}

// ===== impl ExtensionError =====

impl ExtensionError {
    pub fn new(status: PluginStatus, message: impl Into<String>) -> ExtensionError {
        ExtensionError {
            status,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ExtensionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:?})", self.message, self.status)
    }
}

impl std::error::Error for ExtensionError {}

// ===== impl ExtensionInstance =====

impl<'a> ExtensionInstance<'a> {
    pub(crate) fn new(
        module: &'a str,
        name: &'a str,
        argument: Option<&'a str>,
        substmts: &'a [Stmt],
        path: Option<String>,
    ) -> ExtensionInstance<'a> {
        ExtensionInstance {
            module,
            name,
            argument,
            substmts,
            path,
            data: None,
        }
    }

    /// Name of the module defining the extension.
    pub fn module(&self) -> &str {
        self.module
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn argument(&self) -> Option<&str> {
        self.argument
    }

    /// Schema path of the node carrying the instance, if any.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn substatements(&self) -> &[Stmt] {
        self.substmts
    }

    /// First substatement with the given keyword.
    pub fn substatement(&self, keyword: &str) -> Option<&Stmt> {
        self.substmts.iter().find(|s| s.keyword == keyword)
    }

    /// Attach data to the compiled instance.
    pub fn set_data(&mut self, data: ExtensionData) {
        self.data = Some(data);
    }

    pub(crate) fn take_data(&mut self) -> Option<ExtensionData> {
        self.data.take()
    }
}

/// Find the plugin registered for an extension.
pub(crate) fn find_plugin<'p>(
    plugins: &'p [Box<dyn ExtensionPlugin>],
    module: &str,
    name: &str,
) -> Option<&'p dyn ExtensionPlugin> {
    plugins
        .iter()
        .find(|p| p.module() == module && p.name() == name)
        .map(|p| p.as_ref())
}

/// Translate the outcome of a plugin hook.
pub(crate) fn hook_result(
    plugin: &dyn ExtensionPlugin,
    result: std::result::Result<(), ExtensionError>,
) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => match err.status {
            PluginStatus::Success | PluginStatus::NotApplicable => Ok(()),
            _ => Err(Error::new(
                ErrorCode::Plugin,
                format!(
                    "Extension plugin \"{}:{}\" failed: {}",
                    plugin.module(),
                    plugin.name(),
                    err
                ),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Annotation;

    impl ExtensionPlugin for Annotation {
        fn module(&self) -> &str {
            "ietf-yang-metadata"
        }

        fn name(&self) -> &str {
            "annotation"
        }

        fn compile(
            &self,
            ext: &mut ExtensionInstance<'_>,
        ) -> std::result::Result<(), ExtensionError> {
            match ext.argument() {
                Some("skip") => Err(ExtensionError::new(
                    PluginStatus::NotApplicable,
                    "not handled",
                )),
                Some(_) => Ok(()),
                None => Err(ExtensionError::new(
                    PluginStatus::InvalidInput,
                    "missing argument",
                )),
            }
        }
    }

    #[test]
    fn statuses() {
        let plugins: Vec<Box<dyn ExtensionPlugin>> = vec![Box::new(Annotation)];
        let plugin = find_plugin(&plugins, "ietf-yang-metadata", "annotation").unwrap();
        assert!(find_plugin(&plugins, "other", "annotation").is_none());

        let mut ext = ExtensionInstance::new("ietf-yang-metadata", "annotation", Some("skip"), &[], None);
        assert!(hook_result(plugin, plugin.compile(&mut ext)).is_ok());

        let mut ext = ExtensionInstance::new("ietf-yang-metadata", "annotation", None, &[], None);
        let err = hook_result(plugin, plugin.compile(&mut ext)).unwrap_err();
        assert_eq!(err.errcode, ErrorCode::Plugin);
        assert!(err.to_string().contains("missing argument"));
    }
}
