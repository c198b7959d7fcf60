// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Options controlling how a port is generated. */

use {
    crate::{
        dependency::{ErrorPolicy, TranslationPolicy},
        error::{FreeBsdError, Result},
        plist::{file_name, ExtraModule},
    },
    once_cell::sync::Lazy,
    regex::Regex,
    serde::Deserialize,
    std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
    },
};

/// `python_min_version` values must start like `X.Y`.
static RE_PYTHON_MIN_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]\.[0-9]").unwrap());

/// Port generation options.
///
/// Paths are relative to the source directory of the distribution unless
/// absolute. Instances are typically deserialized from YAML:
///
/// ```yaml
/// python_min_version: "3.8"
/// name_prefix: true
/// configs:
///   - conf/app.conf.sample
/// extra_modules:
///   - source: scripts/app.py
///     destination: ${PYTHON_SITELIBDIR}/app/
/// ```
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PortOptions {
    /// Byte compile with optimization (`-O1`).
    pub optimize: bool,

    /// Minimum Python version, e.g. `3.8`.
    pub python_min_version: Option<String>,

    /// Script run before and after installation.
    pub pkg_install: Option<PathBuf>,

    /// Script run before and after deinstallation.
    pub pkg_deinstall: Option<PathBuf>,

    /// Scripts installed into `etc/periodic/daily`.
    pub periodic_daily: Vec<String>,

    /// rc.d scripts.
    pub rc_scripts: Vec<String>,

    /// Files installed into `etc`.
    pub configs: Vec<String>,

    /// Files installed to arbitrary destinations.
    pub extra_modules: Vec<ExtraModule>,

    /// Prefix the package name with `${PYTHON_PKGNAMEPREFIX}`.
    pub name_prefix: bool,

    /// Suffix the package name with `${PYTHON_PKGNAMESUFFIX}`.
    pub name_suffix: bool,

    /// Text prepended to the one line package description.
    pub brief_prefix: Option<String>,

    /// Python packages to remove directories of on deinstall.
    ///
    /// Derived from the trial installation when not set.
    pub packages: Option<Vec<String>>,

    /// Location of the ports tree.
    pub ports_dir: Option<PathBuf>,

    /// Extra distribution name to `USE_*` flag mappings.
    pub use_flags: BTreeMap<String, String>,

    /// Category for dependencies not found in the ports tree.
    pub default_category: Option<String>,

    /// Handling of dependencies that can't be translated.
    pub error_policy: ErrorPolicy,
}

impl PortOptions {
    /// Resolve a possibly relative path against the source directory.
    pub fn source_path(source_dir: &Path, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            source_dir.join(path)
        }
    }

    /// Check the options before anything is written.
    ///
    /// Every referenced file must exist.
    pub fn validate(&self, source_dir: &Path) -> Result<()> {
        if let Some(version) = &self.python_min_version {
            if !RE_PYTHON_MIN_VERSION.is_match(version) {
                return Err(FreeBsdError::InvalidPythonMinVersion(version.clone()));
            }
        }

        let check = |option: &'static str, path: &Path| -> Result<()> {
            let resolved = Self::source_path(source_dir, path);

            if resolved.is_file() {
                Ok(())
            } else {
                Err(FreeBsdError::OptionFileMissing {
                    option,
                    path: resolved.display().to_string(),
                })
            }
        };

        if let Some(path) = &self.pkg_install {
            check("pkg_install", path)?;
        }
        if let Some(path) = &self.pkg_deinstall {
            check("pkg_deinstall", path)?;
        }
        for path in &self.periodic_daily {
            check("periodic_daily", Path::new(path))?;
        }
        for path in &self.rc_scripts {
            check("rc_scripts", Path::new(path))?;
        }
        for path in &self.configs {
            check("configs", Path::new(path))?;
        }
        for module in &self.extra_modules {
            check("extra_modules", Path::new(&module.source))?;
        }

        Ok(())
    }

    /// The translation policy these options describe.
    pub fn translation_policy(&self) -> TranslationPolicy {
        let mut policy = TranslationPolicy::default();

        for (name, flag) in &self.use_flags {
            policy = policy.with_use_flag(name, flag);
        }
        if let Some(category) = &self.default_category {
            policy = policy.with_default_category(category);
        }

        policy
    }

    /// rc.d service names: the script file name up to the first `.`.
    pub fn rc_names(&self) -> Vec<String> {
        self.rc_scripts
            .iter()
            .map(|s| rc_name(s).to_string())
            .collect()
    }
}

/// Service name of an rc script, e.g. `scripts/rc1.sh` => `rc1`.
pub fn rc_name(path: &str) -> &str {
    let name = file_name(path);

    name.split('.').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    #[test]
    fn deserialize_yaml() {
        let options: PortOptions = serde_yaml::from_str(
            "python_min_version: '3.8'\n\
             name_prefix: true\n\
             rc_scripts: [scripts/appd.sh]\n\
             extra_modules:\n\
             \x20 - source: scripts/foo.py\n\
             \x20   destination: ${SITE}/pkg/\n\
             use_flags:\n\
             \x20 django: USE_DJANGO\n\
             error_policy: skip\n",
        )
        .unwrap();

        assert_eq!(options.python_min_version.as_deref(), Some("3.8"));
        assert!(options.name_prefix);
        assert!(!options.name_suffix);
        assert_eq!(options.rc_names(), vec!["appd"]);
        assert_eq!(
            options.extra_modules,
            vec![ExtraModule::from(("scripts/foo.py", "${SITE}/pkg/"))]
        );
        assert_eq!(options.error_policy, ErrorPolicy::Skip);
        assert_eq!(
            options.translation_policy().use_flag("django"),
            Some("USE_DJANGO")
        );
        assert_eq!(
            options.translation_policy().use_flag("apache"),
            Some("USE_APACHE")
        );

        assert!(serde_yaml::from_str::<PortOptions>("no_such_option: 1\n").is_err());
    }

    #[test]
    fn validate_python_min_version() -> Result<()> {
        let td = TempDir::new()?;

        for good in ["2.5", "3.10", "3.9+"] {
            let options = PortOptions {
                python_min_version: Some(good.into()),
                ..Default::default()
            };
            options.validate(td.path())?;
        }

        for bad in ["3", "three", "310"] {
            let options = PortOptions {
                python_min_version: Some(bad.into()),
                ..Default::default()
            };
            assert!(matches!(
                options.validate(td.path()),
                Err(FreeBsdError::InvalidPythonMinVersion(_))
            ));
        }

        Ok(())
    }

    #[test]
    fn validate_missing_files() -> Result<()> {
        let td = TempDir::new()?;
        std::fs::write(td.path().join("pkg-install.sh"), "#!/bin/sh\n")?;

        let options = PortOptions {
            pkg_install: Some("pkg-install.sh".into()),
            ..Default::default()
        };
        options.validate(td.path())?;

        let options = PortOptions {
            pkg_deinstall: Some("pkg-deinstall.sh".into()),
            ..Default::default()
        };
        match options.validate(td.path()) {
            Err(FreeBsdError::OptionFileMissing { option, .. }) => {
                assert_eq!(option, "pkg_deinstall");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let options = PortOptions {
            configs: vec!["missing.conf".into()],
            ..Default::default()
        };
        assert!(options.validate(td.path()).is_err());

        Ok(())
    }

    #[test]
    fn rc_names() {
        assert_eq!(rc_name("scripts/rc1.sh"), "rc1");
        assert_eq!(rc_name("appd"), "appd");
        assert_eq!(rc_name("dir/app.d.sh"), "app");
    }
}
