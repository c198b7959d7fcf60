// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Translating Python requirements into ports Makefile dependency syntax.

Every requirement becomes exactly one of two things:

* A *use flag* (e.g. `USE_APACHE=2.0+`) when its name is one of the
  frameworks the ports infrastructure knows about.
* A `RUN_DEPENDS` entry of the form `name>=version:${PORTSDIR}/category/port`
  referencing another port.
 */

use {
    crate::{
        error::{FreeBsdError, Result},
        ports_tree::PortResolver,
    },
    log::warn,
    python_packaging::version_predicate::{Comparator, VersionPredicate},
    serde::Deserialize,
    std::collections::BTreeMap,
};

/// Separator between `RUN_DEPENDS` entries.
///
/// Long dependency lists are wrapped over several physical lines.
pub const RUN_DEPENDS_SEPARATOR: &str = " \\\n\t\t";

/// Category used for ports that can't be found in the ports tree.
pub const DEFAULT_CATEGORY: &str = "misc";

/// The tables driving dependency translation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TranslationPolicy {
    /// Distribution name to `USE_*` Makefile variable.
    pub use_flags: BTreeMap<String, String>,

    /// Comparator to the suffix appended to a version in a use flag value.
    pub use_operators: BTreeMap<Comparator, String>,

    /// Comparator to the operator used in a `RUN_DEPENDS` entry.
    pub run_operators: BTreeMap<Comparator, String>,

    /// Category of ports the resolver can't find.
    pub default_category: String,
}

impl Default for TranslationPolicy {
    fn default() -> Self {
        let use_flags = [("apache", "USE_APACHE")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        // The ports version syntax has no strict comparison. A strict lower bound
        // is widened to an inclusive one.
        let use_operators = [Comparator::Greater, Comparator::GreaterOrEqual]
            .into_iter()
            .map(|c| (c, "+".to_string()))
            .collect();
        let run_operators = [Comparator::Greater, Comparator::GreaterOrEqual]
            .into_iter()
            .map(|c| (c, ">=".to_string()))
            .collect();

        Self {
            use_flags,
            use_operators,
            run_operators,
            default_category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

impl TranslationPolicy {
    /// Register an additional framework use flag.
    pub fn with_use_flag(mut self, name: impl ToString, flag: impl ToString) -> Self {
        self.use_flags.insert(name.to_string(), flag.to_string());
        self
    }

    /// Set the category used for unresolvable ports.
    pub fn with_default_category(mut self, category: impl ToString) -> Self {
        self.default_category = category.to_string();
        self
    }

    /// The use flag for a distribution name, if it is a framework.
    pub fn use_flag(&self, name: &str) -> Option<&str> {
        self.use_flags.get(name).map(|s| s.as_str())
    }
}

/// What to do when a dependency can't be translated.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Fail the whole translation.
    #[default]
    Abort,

    /// Warn and leave the dependency out.
    Skip,
}

/// The translated form of a single requirement.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TranslatedDependency {
    /// A `FLAG=value` line.
    Use(String),

    /// A `RUN_DEPENDS` entry.
    Run(String),
}

/// Translated dependencies of a distribution.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Translation {
    pub use_lines: Vec<String>,
    pub run_lines: Vec<String>,

    /// Requirements left out under [ErrorPolicy::Skip].
    pub skipped: Vec<String>,

    /// Requirements whose environment marker was ignored.
    ///
    /// Ports have no conditional dependencies, so these are translated
    /// unconditionally.
    pub unconditional: Vec<String>,
}

impl Translation {
    /// Use flag lines, one per line.
    pub fn use_block(&self) -> String {
        self.use_lines.join("\n")
    }

    /// `RUN_DEPENDS` value with line continuations.
    pub fn run_block(&self) -> String {
        self.run_lines.join(RUN_DEPENDS_SEPARATOR)
    }

    pub fn is_empty(&self) -> bool {
        self.use_lines.is_empty() && self.run_lines.is_empty()
    }
}

/// Translates requirement expressions against a policy and a port resolver.
pub struct DependencyTranslator<'a, R: PortResolver + ?Sized> {
    policy: TranslationPolicy,
    resolver: &'a R,
    error_policy: ErrorPolicy,
}

impl<'a, R: PortResolver + ?Sized> DependencyTranslator<'a, R> {
    pub fn new(policy: TranslationPolicy, resolver: &'a R) -> Self {
        Self {
            policy,
            resolver,
            error_policy: ErrorPolicy::default(),
        }
    }

    /// Set the behavior for requirements that can't be translated.
    pub fn set_error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.error_policy = error_policy;
        self
    }

    pub fn policy(&self) -> &TranslationPolicy {
        &self.policy
    }

    /// Translate a single requirement expression.
    pub fn translate_requirement(&self, requirement: &str) -> Result<TranslatedDependency> {
        let predicate = VersionPredicate::parse(requirement)?;

        self.translate_predicate(&predicate)
    }

    /// Translate a parsed requirement.
    pub fn translate_predicate(&self, predicate: &VersionPredicate) -> Result<TranslatedDependency> {
        if predicate.constraints.len() > 1 {
            return Err(FreeBsdError::UnsupportedConstraint {
                name: predicate.name.clone(),
                count: predicate.constraints.len(),
            });
        }

        let constraint = predicate.constraints.first();

        let lookup = |table: &BTreeMap<Comparator, String>, comparator: Comparator| {
            table
                .get(&comparator)
                .cloned()
                .ok_or_else(|| FreeBsdError::UnsupportedOperator {
                    name: predicate.name.clone(),
                    operator: comparator,
                })
        };

        if let Some(flag) = self.policy.use_flag(&predicate.name) {
            let value = match constraint {
                Some(c) => format!(
                    "{}{}",
                    c.version,
                    lookup(&self.policy.use_operators, c.comparator)?
                ),
                None => "yes".to_string(),
            };

            Ok(TranslatedDependency::Use(format!("{}={}", flag, value)))
        } else {
            let qualifier = match constraint {
                Some(c) => format!(
                    "{}{}",
                    lookup(&self.policy.run_operators, c.comparator)?,
                    c.version
                ),
                None => String::new(),
            };

            let port = self
                .resolver
                .resolve(&predicate.name, &self.policy.default_category)?;

            Ok(TranslatedDependency::Run(format!(
                "{}{}:${{PORTSDIR}}{}",
                port.canonical_name, qualifier, port.relative_path
            )))
        }
    }

    /// Translate a list of requirement expressions.
    ///
    /// Under [ErrorPolicy::Abort] the first untranslatable requirement fails the
    /// whole call and no output is produced.
    pub fn translate<I, S>(&self, requirements: I) -> Result<Translation>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut translation = Translation::default();

        for requirement in requirements {
            let requirement = requirement.as_ref();

            let res = VersionPredicate::parse(requirement)
                .map_err(FreeBsdError::from)
                .and_then(|predicate| {
                    let translated = self.translate_predicate(&predicate)?;
                    Ok((translated, predicate.marker))
                });

            match res {
                Ok((translated, marker)) => {
                    if let Some(marker) = marker {
                        warn!(
                            "dependency '{}' only applies when {}; translating it unconditionally",
                            requirement, marker
                        );
                        translation.unconditional.push(requirement.to_string());
                    }

                    match translated {
                        TranslatedDependency::Use(line) => translation.use_lines.push(line),
                        TranslatedDependency::Run(line) => translation.run_lines.push(line),
                    }
                }
                Err(e)
                    if self.error_policy == ErrorPolicy::Skip
                        && e.is_untranslatable_dependency() =>
                {
                    warn!("skipping dependency '{}': {}", requirement, e);
                    translation.skipped.push(requirement.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        Ok(translation)
    }
}
