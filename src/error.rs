//
// Copyright (c) The yang-rs Core Contributors
//
// SPDX-License-Identifier: MIT
//

/// A convenience wrapper around `Result` for `yang_core::Error`.
pub type Result<T> = std::result::Result<T, Error>;

/// Error classes reported by the engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorCode {
    /// Malformed schema or data source.
    Syntax,
    /// The requested module could not be located.
    ModuleNotFound,
    /// Schema compilation failed.
    Compile,
    /// Cyclic typedef, grouping, identity, feature or leafref chain.
    CyclicDefinition,
    /// Augment target does not exist.
    AugmentTarget,
    /// A node is present although its "when" condition is false.
    WhenViolation,
    /// A "must" condition evaluated to false.
    MustViolation,
    /// Incompatible nodes were merged.
    MergeConflict,
    /// A path, module, feature or search directory lookup failed.
    NotFound,
    /// Context creation failed.
    ContextCreation,
    /// Value does not conform to its type.
    InvalidValue,
    /// String value does not match a pattern restriction.
    PatternMismatch,
    /// Two list instances share the same key tuple.
    KeyConflict,
    /// A mandatory node is missing.
    Mandatory,
    /// min-elements or max-elements violated.
    Cardinality,
    /// A "unique" constraint violated.
    Unique,
    /// Leafref or instance-identifier target instance does not exist.
    InstanceRequired,
    /// Other data validation failure.
    Validation,
    /// An extension plugin callback failed.
    Plugin,
    /// Any other failure, with the drained diagnostic queue as message.
    Native,
}

/// Compiler pass in which a schema error was detected.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CompilePass {
    Identifiers,
    Types,
    Structure,
    AugmentDeviation,
    Features,
    Leafref,
    Consistency,
}

/// Engine error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    pub errcode: ErrorCode,
    pub msg: Option<String>,
    pub path: Option<String>,
    pub apptag: Option<String>,
    pub pass: Option<CompilePass>,
}

// ===== impl ErrorCode =====

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Syntax => "syntax error",
            ErrorCode::ModuleNotFound => "module not found",
            ErrorCode::Compile => "compile error",
            ErrorCode::CyclicDefinition => "cyclic definition",
            ErrorCode::AugmentTarget => "augment target not found",
            ErrorCode::WhenViolation => "when condition violated",
            ErrorCode::MustViolation => "must condition violated",
            ErrorCode::MergeConflict => "merge conflict",
            ErrorCode::NotFound => "not found",
            ErrorCode::ContextCreation => "context creation failed",
            ErrorCode::InvalidValue => "invalid value",
            ErrorCode::PatternMismatch => "pattern mismatch",
            ErrorCode::KeyConflict => "duplicate list key",
            ErrorCode::Mandatory => "missing mandatory node",
            ErrorCode::Cardinality => "cardinality violated",
            ErrorCode::Unique => "unique constraint violated",
            ErrorCode::InstanceRequired => "required instance missing",
            ErrorCode::Validation => "validation error",
            ErrorCode::Plugin => "extension plugin error",
            ErrorCode::Native => "error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ===== impl CompilePass =====

impl CompilePass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilePass::Identifiers => "identifiers",
            CompilePass::Types => "types",
            CompilePass::Structure => "structure",
            CompilePass::AugmentDeviation => "augment-deviation",
            CompilePass::Features => "features",
            CompilePass::Leafref => "leafref",
            CompilePass::Consistency => "consistency",
        }
    }
}

impl std::fmt::Display for CompilePass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ===== impl Error =====

impl Error {
    pub fn new(errcode: ErrorCode, msg: impl Into<String>) -> Error {
        Error {
            errcode,
            msg: Some(msg.into()),
            path: None,
            apptag: None,
            pass: None,
        }
    }

    pub(crate) fn with_path(mut self, path: impl Into<String>) -> Error {
        self.path = Some(path.into());
        self
    }

    pub(crate) fn with_path_opt(mut self, path: Option<String>) -> Error {
        if self.path.is_none() {
            self.path = path;
        }
        self
    }

    pub(crate) fn with_apptag(mut self, apptag: Option<String>) -> Error {
        self.apptag = apptag;
        self
    }

    pub(crate) fn with_pass(mut self, pass: CompilePass) -> Error {
        if self.pass.is_none() {
            self.pass = Some(pass);
        }
        self
    }

    pub(crate) fn syntax(msg: impl Into<String>) -> Error {
        Error::new(ErrorCode::Syntax, msg)
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Error {
        Error::new(ErrorCode::NotFound, msg)
    }

    pub(crate) fn compile(msg: impl Into<String>) -> Error {
        Error::new(ErrorCode::Compile, msg)
    }

    pub(crate) fn invalid_value(msg: impl Into<String>) -> Error {
        Error::new(ErrorCode::InvalidValue, msg)
    }
}

impl std::fmt::Display for Error {
    // Print only the base error message by default.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.msg {
            Some(msg) => write!(f, "{}", msg),
            None => write!(f, "Unknown error: {}", self.errcode),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_message() {
        let err = Error::compile("Invalid range restriction.")
            .with_path("/mod:conf/speed")
            .with_pass(CompilePass::Types);
        assert_eq!(err.to_string(), "Invalid range restriction.");
        assert_eq!(err.pass, Some(CompilePass::Types));
        assert_eq!(err.path.as_deref(), Some("/mod:conf/speed"));
    }

    #[test]
    fn display_without_message() {
        let err = Error {
            errcode: ErrorCode::Native,
            msg: None,
            path: None,
            apptag: None,
            pass: None,
        };
        assert_eq!(err.to_string(), "Unknown error: error");
    }
}
