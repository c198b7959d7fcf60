// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Python requirement expression handling.

Two syntaxes are recognized:

* The distutils `Requires` form: `name (>=1.0, <2.0)`.
* The PEP 508 `Requires-Dist` form: `name[extra]>=1.0,<2.0; marker`.

Environment markers are retained verbatim but never evaluated.
 */

use {
    once_cell::sync::Lazy,
    regex::Regex,
    std::{
        fmt::{Display, Formatter},
        str::FromStr,
    },
    thiserror::Error,
};

/// Regular expression to split a requirement into its name and constraint text.
static RE_REQUIREMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)
        ^\s*
        # Distribution name. Letters, digits and a few punctuation characters.
        (?P<name>[A-Za-z0-9_][A-Za-z0-9._-]*)
        \s*
        # Optional extras. We don't do anything with them.
        (?:\[[^\]]*\])?
        \s*
        # Everything else is the constraint list.
        (?P<rest>.*?)
        \s*$
        "#,
    )
    .unwrap()
});

/// Regular expression matching a single `operator version` clause.
static RE_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<op>===|~=|==|!=|<=|>=|<|>)\s*(?P<version>[^\s,()]+)\s*$").unwrap()
});

/// Errors related to requirement parsing.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum VersionPredicateError {
    #[error("empty requirement expression")]
    Empty,

    #[error("invalid distribution name in requirement: {0}")]
    InvalidName(String),

    #[error("unbalanced parenthesis in requirement: {0}")]
    UnbalancedParenthesis(String),

    #[error("invalid version constraint `{clause}` in requirement: {requirement}")]
    InvalidConstraint { requirement: String, clause: String },

    #[error("unknown comparison operator: {0}")]
    UnknownComparator(String),
}

/// Result type for requirement parsing.
pub type Result<T> = std::result::Result<T, VersionPredicateError>;

/// A version comparison operator.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Comparator {
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
    GreaterOrEqual,
    Greater,
    Compatible,
    Arbitrary,
}

impl Comparator {
    /// The operator as written in requirement expressions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::GreaterOrEqual => ">=",
            Self::Greater => ">",
            Self::Compatible => "~=",
            Self::Arbitrary => "===",
        }
    }
}

impl Display for Comparator {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Comparator {
    type Err = VersionPredicateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "<" => Ok(Self::Less),
            "<=" => Ok(Self::LessOrEqual),
            "==" => Ok(Self::Equal),
            "!=" => Ok(Self::NotEqual),
            ">=" => Ok(Self::GreaterOrEqual),
            ">" => Ok(Self::Greater),
            "~=" => Ok(Self::Compatible),
            "===" => Ok(Self::Arbitrary),
            _ => Err(Self::Err::UnknownComparator(s.to_string())),
        }
    }
}

/// A single `operator version` pair.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VersionConstraint {
    pub comparator: Comparator,
    pub version: String,
}

impl Display for VersionConstraint {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}{}", self.comparator, self.version)
    }
}

/// A distribution name plus an ordered list of version constraints.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VersionPredicate {
    /// Name of the distribution being depended on.
    pub name: String,

    /// Version constraints, in the order they were written.
    pub constraints: Vec<VersionConstraint>,

    /// Environment marker following `;`, if any.
    pub marker: Option<String>,
}

impl Display for VersionPredicate {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name)?;

        if !self.constraints.is_empty() {
            write!(
                f,
                " ({})",
                self.constraints
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
        }

        if let Some(marker) = &self.marker {
            write!(f, "; {}", marker)?;
        }

        Ok(())
    }
}

impl FromStr for VersionPredicate {
    type Err = VersionPredicateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl VersionPredicate {
    /// Parse a requirement expression.
    pub fn parse(s: &str) -> Result<Self> {
        let (expression, marker) = match s.split_once(';') {
            Some((expression, marker)) => {
                let marker = marker.trim();
                (
                    expression,
                    if marker.is_empty() {
                        None
                    } else {
                        Some(marker.to_string())
                    },
                )
            }
            None => (s, None),
        };

        if expression.trim().is_empty() {
            return Err(VersionPredicateError::Empty);
        }

        let caps = RE_REQUIREMENT
            .captures(expression)
            .ok_or_else(|| VersionPredicateError::InvalidName(s.trim().to_string()))?;

        let name = caps["name"].to_string();
        let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or_default();

        let clauses = if let Some(inner) = rest.strip_prefix('(') {
            inner
                .strip_suffix(')')
                .ok_or_else(|| VersionPredicateError::UnbalancedParenthesis(s.trim().to_string()))?
        } else if rest.ends_with(')') {
            return Err(VersionPredicateError::UnbalancedParenthesis(
                s.trim().to_string(),
            ));
        } else {
            rest
        };

        let mut constraints = vec![];

        if !clauses.trim().is_empty() {
            for clause in clauses.split(',') {
                let caps = RE_CLAUSE.captures(clause).ok_or_else(|| {
                    VersionPredicateError::InvalidConstraint {
                        requirement: s.trim().to_string(),
                        clause: clause.trim().to_string(),
                    }
                })?;

                constraints.push(VersionConstraint {
                    comparator: Comparator::from_str(&caps["op"])?,
                    version: caps["version"].to_string(),
                });
            }
        }

        Ok(Self {
            name,
            constraints,
            marker,
        })
    }

    /// Whether the predicate places no constraint on the version.
    pub fn is_unconstrained(&self) -> bool {
        self.constraints.is_empty()
    }
}
