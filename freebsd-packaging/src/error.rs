// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {
    python_packaging::version_predicate::{Comparator, VersionPredicateError},
    thiserror::Error,
};

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum FreeBsdError {
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on path {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("glob pattern error: {0:?}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("glob error: {0:?}")]
    Glob(#[from] glob::GlobError),

    #[error("requirement parsing error: {0}")]
    VersionPredicate(#[from] VersionPredicateError),

    #[error("dependency {name} has {count} version constraints; it's too complicated to translate")]
    UnsupportedConstraint { name: String, count: usize },

    #[error("dependency {name} uses comparison operator {operator}, which FreeBSD ports can't express")]
    UnsupportedOperator { name: String, operator: Comparator },

    #[error("python_min_version must look like X.Y: {0}")]
    InvalidPythonMinVersion(String),

    #[error("{option} file does not exist: {path}")]
    OptionFileMissing { option: &'static str, path: String },

    #[error("trial installation failed: {0}")]
    TrialInstall(String),

    #[error("command failed: {0}")]
    Command(String),
}

impl FreeBsdError {
    /// Whether this error describes a dependency the translator can't express.
    ///
    /// These are the errors a lenient translation may skip.
    pub fn is_untranslatable_dependency(&self) -> bool {
        matches!(
            self,
            Self::VersionPredicate(_)
                | Self::UnsupportedConstraint { .. }
                | Self::UnsupportedOperator { .. }
        )
    }
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, FreeBsdError>;
