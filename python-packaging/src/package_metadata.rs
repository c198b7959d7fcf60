// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Working with Python package metadata (i.e. `PKG-INFO` and `METADATA` files) */

use {
    anyhow::{anyhow, Context, Result},
    mailparse::parse_mail,
    std::path::Path,
};

/// Value distutils writes for metadata fields that weren't defined.
const UNKNOWN: &str = "UNKNOWN";

/// Represents a Python PKG-INFO / METADATA file.
pub struct PythonPackageMetadata {
    headers: Vec<(String, String)>,
    body: String,
}

impl PythonPackageMetadata {
    /// Create an instance from data in a METADATA file.
    pub fn from_metadata(data: &[u8]) -> Result<PythonPackageMetadata> {
        let message = parse_mail(data).context("parsing metadata file")?;

        let headers = message
            .headers
            .iter()
            .map(|header| (header.get_key(), header.get_value()))
            .collect::<Vec<_>>();

        let body = message.get_body().context("decoding metadata body")?;

        Ok(PythonPackageMetadata { headers, body })
    }

    /// Create an instance from a file on the filesystem.
    pub fn from_path(path: &Path) -> Result<PythonPackageMetadata> {
        let data = std::fs::read(path)
            .with_context(|| format!("reading metadata file {}", path.display()))?;

        Self::from_metadata(&data)
    }

    /// Find the first value of a specified header.
    pub fn find_first_header(&self, key: &str) -> Option<&str> {
        for (k, v) in &self.headers {
            if k == key {
                return Some(v);
            }
        }

        None
    }

    /// Find all values of a specified header.
    pub fn find_all_headers(&self, key: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter_map(|(k, v)| if k == key { Some(v.as_ref()) } else { None })
            .collect::<Vec<_>>()
    }

    /// Find the first value of a header, treating distutils placeholders as absent.
    fn find_defined_header(&self, key: &str) -> Option<&str> {
        self.find_first_header(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && *v != UNKNOWN)
    }

    pub fn name(&self) -> Option<&str> {
        self.find_defined_header("Name")
    }

    pub fn version(&self) -> Option<&str> {
        self.find_defined_header("Version")
    }

    pub fn summary(&self) -> Option<&str> {
        self.find_defined_header("Summary")
    }

    pub fn home_page(&self) -> Option<&str> {
        self.find_defined_header("Home-page")
    }

    pub fn author(&self) -> Option<&str> {
        self.find_defined_header("Author")
    }

    pub fn author_email(&self) -> Option<&str> {
        self.find_defined_header("Author-email")
    }

    pub fn maintainer(&self) -> Option<&str> {
        self.find_defined_header("Maintainer")
    }

    pub fn maintainer_email(&self) -> Option<&str> {
        self.find_defined_header("Maintainer-email")
    }

    pub fn license(&self) -> Option<&str> {
        self.find_defined_header("License")
    }

    /// The long description.
    ///
    /// Newer metadata versions carry it in the message body. Older ones use a
    /// `Description` header.
    pub fn description(&self) -> Option<&str> {
        let body = self.body.trim_end();

        if !body.trim().is_empty() {
            Some(body)
        } else {
            self.find_defined_header("Description")
        }
    }

    pub fn classifiers(&self) -> Vec<&str> {
        self.find_all_headers("Classifier")
    }

    /// Requirement expressions from `Requires-Dist` followed by `Requires`.
    pub fn requires(&self) -> Vec<&str> {
        let mut requires = self.find_all_headers("Requires-Dist");
        requires.extend(self.find_all_headers("Requires"));

        requires
    }

    /// Obtain an owned [DistributionDescriptor] from this metadata.
    pub fn descriptor(&self) -> Result<DistributionDescriptor> {
        let owned = |v: Option<&str>| v.map(|s| s.to_string());

        Ok(DistributionDescriptor {
            name: self
                .name()
                .ok_or_else(|| anyhow!("metadata lacks a Name field"))?
                .to_string(),
            version: self
                .version()
                .ok_or_else(|| anyhow!("metadata lacks a Version field"))?
                .to_string(),
            summary: owned(self.summary()),
            description: owned(self.description()),
            home_page: owned(self.home_page()),
            author: owned(self.author()),
            author_email: owned(self.author_email()),
            maintainer: owned(self.maintainer()),
            maintainer_email: owned(self.maintainer_email()),
            classifiers: self.classifiers().into_iter().map(String::from).collect(),
            requires: self.requires().into_iter().map(String::from).collect(),
        })
    }
}

/// The facts about a Python distribution that packaging it needs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistributionDescriptor {
    pub name: String,
    pub version: String,
    /// One line description.
    pub summary: Option<String>,
    /// Long description.
    pub description: Option<String>,
    pub home_page: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
    pub classifiers: Vec<String>,
    /// Requirement expressions of run-time dependencies.
    pub requires: Vec<String>,
}

impl DistributionDescriptor {
    /// Email address of whoever should be contacted about the package.
    pub fn contact_email(&self) -> Option<&str> {
        self.maintainer_email
            .as_deref()
            .or(self.author_email.as_deref())
    }
}
