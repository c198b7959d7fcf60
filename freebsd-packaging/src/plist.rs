// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package list (`pkg-plist`) handling.

The base of a plist is the install record of a trial installation, rewritten
to paths relative to `${PREFIX}`. Files the port installs itself (periodic
scripts, configs, extra modules) and `@dirrm` markers for the Python package
directories are appended to it.
 */

use {
    crate::error::{FreeBsdError, Result},
    once_cell::sync::Lazy,
    regex::Regex,
    serde::Deserialize,
    std::{collections::BTreeSet, io::Write, path::Path},
};

/// PLIST_SUB macro for the Python site-packages directory.
pub const SITELIBDIR_MACRO: &str = "%%PYTHON_SITELIBDIR%%";

/// Directory Python 3 writes bytecode caches to inside a package.
pub const PYCACHE_DIR: &str = "__pycache__";

/// Where periodic daily scripts live, relative to `${PREFIX}`.
pub const PERIODIC_DAILY_DIR: &str = "etc/periodic/daily";

/// Where configuration files live, relative to `${PREFIX}`.
pub const CONFIG_DIR: &str = "etc";

/// Makefile variable references, e.g. `${PYTHON_SITELIBDIR}`.
static RE_MAKE_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").unwrap());

/// The final component of a `/` delimited path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Rewrite Makefile variable references (`${VAR}`) to PLIST_SUB macros (`%%VAR%%`).
pub fn make_variables_to_plist_macros(s: &str) -> String {
    RE_MAKE_VARIABLE.replace_all(s, "%%$1%%").to_string()
}

/// A file installed by the port to a location of its choosing.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ExtraModule {
    /// Path of the file in the source tree.
    pub source: String,

    /// Install destination. May reference Makefile variables.
    ///
    /// A trailing `/` means the destination is a directory.
    pub destination: String,
}

impl<S: ToString, D: ToString> From<(S, D)> for ExtraModule {
    fn from((source, destination): (S, D)) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
        }
    }
}

impl ExtraModule {
    /// The plist line for the installed file.
    pub fn plist_path(&self) -> String {
        let mut path = make_variables_to_plist_macros(&self.destination);

        if path.ends_with('/') {
            path.push_str(file_name(&self.source));
        }

        path
    }
}

/// Entries appended to the base plist.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PlistSupplements {
    pub periodic_daily: Vec<String>,
    pub configs: Vec<String>,
    pub extra_modules: Vec<ExtraModule>,

    /// Python packages (dotted names) whose directories are removed on deinstall.
    pub packages: Vec<String>,

    /// Packages (dotted names) holding a bytecode cache directory.
    pub pycache_packages: Vec<String>,
}

impl PlistSupplements {
    /// `@dirrm` lines, deepest package directories first.
    ///
    /// A package's bytecode cache directory is removed right before it.
    pub fn dirrm_lines(&self) -> Vec<String> {
        let mut packages = self.packages.iter().collect::<Vec<_>>();
        packages.sort_by(|a, b| b.len().cmp(&a.len()));

        let mut lines = vec![];

        for package in packages {
            let path = package.replace('.', "/");

            if self.pycache_packages.contains(package) {
                lines.push(format!(
                    "@dirrm {}/{}/{}",
                    SITELIBDIR_MACRO, path, PYCACHE_DIR
                ));
            }
            lines.push(format!("@dirrm {}/{}", SITELIBDIR_MACRO, path));
        }

        lines
    }

    /// All supplementary lines, in the order they belong in the plist.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![];

        for script in &self.periodic_daily {
            lines.push(format!("{}/{}", PERIODIC_DAILY_DIR, file_name(script)));
        }
        for config in &self.configs {
            lines.push(format!("{}/{}", CONFIG_DIR, file_name(config)));
        }
        for module in &self.extra_modules {
            lines.push(module.plist_path());
        }
        lines.extend(self.dirrm_lines());

        lines
    }

    /// Append the supplementary lines to an existing plist file.
    ///
    /// Existing content is left untouched. The file is created if missing.
    pub fn append_to_file(&self, path: &Path) -> Result<()> {
        let io_err = |e: std::io::Error| FreeBsdError::IoPath(path.display().to_string(), e);

        let mut fh = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err)?;

        for line in self.lines() {
            writeln!(fh, "{}", line).map_err(io_err)?;
        }

        Ok(())
    }
}

/// Convert the install record of a trial installation to plist lines.
///
/// `prefix` is the installation prefix (`sys.prefix`) and `site_packages` the
/// directory pure Python modules are installed into. Paths under
/// `site_packages` become relative to [SITELIBDIR_MACRO]; other paths become
/// relative to `prefix`. `egg-info` metadata is dropped.
pub fn rewrite_install_record(record: &str, prefix: &str, site_packages: &str) -> Vec<String> {
    let prefix = format!("{}/", prefix.trim_end_matches('/'));
    let site_packages = site_packages.trim_end_matches('/');

    record
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .filter(|line| !line.trim_end_matches('/').ends_with("egg-info"))
        .map(|line| {
            if let Some(rest) = line.strip_prefix(site_packages) {
                if rest.is_empty() || rest.starts_with('/') {
                    return format!("{}{}", SITELIBDIR_MACRO, rest);
                }
            }

            line.strip_prefix(&prefix).unwrap_or(line).to_string()
        })
        .collect()
}

/// Derive the installed Python packages from plist lines.
///
/// A package is a directory under [SITELIBDIR_MACRO] holding an `__init__.py`.
/// Dotted names are returned, sorted.
pub fn packages_from_plist<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let site_prefix = format!("{}/", SITELIBDIR_MACRO);

    lines
        .iter()
        .filter_map(|line| {
            line.as_ref()
                .strip_prefix(&site_prefix)
                .and_then(|rest| rest.strip_suffix("/__init__.py"))
                .map(|dir| dir.replace('/', "."))
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Derive the packages holding a `__pycache__` directory from plist lines.
///
/// Dotted names are returned, sorted.
pub fn pycache_packages_from_plist<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
    let site_prefix = format!("{}/", SITELIBDIR_MACRO);
    let marker = format!("/{}/", PYCACHE_DIR);

    lines
        .iter()
        .filter_map(|line| {
            line.as_ref()
                .strip_prefix(&site_prefix)
                .and_then(|rest| rest.split_once(&marker))
                .map(|(dir, _)| dir.replace('/', "."))
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Write plist lines to a file, replacing any existing content.
pub fn write_plist<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    let io_err = |e: std::io::Error| FreeBsdError::IoPath(path.display().to_string(), e);

    let mut fh = std::fs::File::create(path).map_err(io_err)?;
    for line in lines {
        writeln!(fh, "{}", line.as_ref()).map_err(io_err)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use {super::*, indoc::indoc, tempfile::TempDir};

    #[test]
    fn extra_module_paths() {
        assert_eq!(
            ExtraModule::from(("scripts/foo.py", "${SITE}/pkg/")).plist_path(),
            "%%SITE%%/pkg/foo.py"
        );
        assert_eq!(
            ExtraModule::from(("foo.py", "${PYTHON_SITELIBDIR}/bar.py")).plist_path(),
            "%%PYTHON_SITELIBDIR%%/bar.py"
        );
        assert_eq!(
            ExtraModule::from(("a/b/c.sh", "libexec/")).plist_path(),
            "libexec/c.sh"
        );
    }

    #[test]
    fn dirrm_deepest_first() {
        let supplements = PlistSupplements {
            packages: vec!["a".into(), "ab".into(), "abc".into()],
            ..Default::default()
        };

        assert_eq!(
            supplements.dirrm_lines(),
            vec![
                "@dirrm %%PYTHON_SITELIBDIR%%/abc",
                "@dirrm %%PYTHON_SITELIBDIR%%/ab",
                "@dirrm %%PYTHON_SITELIBDIR%%/a",
            ]
        );

        let supplements = PlistSupplements {
            packages: vec!["pkg".into(), "pkg.sub".into(), "pkg.sub.leaf".into()],
            ..Default::default()
        };

        assert_eq!(
            supplements.dirrm_lines(),
            vec![
                "@dirrm %%PYTHON_SITELIBDIR%%/pkg/sub/leaf",
                "@dirrm %%PYTHON_SITELIBDIR%%/pkg/sub",
                "@dirrm %%PYTHON_SITELIBDIR%%/pkg",
            ]
        );
    }

    #[test]
    fn dirrm_bytecode_caches() {
        let installed = vec![
            "%%PYTHON_SITELIBDIR%%/pkg/__init__.py",
            "%%PYTHON_SITELIBDIR%%/pkg/__pycache__/__init__.cpython-39.pyc",
            "%%PYTHON_SITELIBDIR%%/pkg/sub/__init__.py",
            "%%PYTHON_SITELIBDIR%%/pkg/sub/__pycache__/__init__.cpython-39.pyc",
            "%%PYTHON_SITELIBDIR%%/pkg/plain/__init__.py",
            "%%PYTHON_SITELIBDIR%%/__pycache__/single.cpython-39.pyc",
        ];

        let supplements = PlistSupplements {
            packages: packages_from_plist(&installed),
            pycache_packages: pycache_packages_from_plist(&installed),
            ..Default::default()
        };

        assert_eq!(supplements.pycache_packages, vec!["pkg", "pkg.sub"]);
        assert_eq!(
            supplements.dirrm_lines(),
            vec![
                "@dirrm %%PYTHON_SITELIBDIR%%/pkg/plain",
                "@dirrm %%PYTHON_SITELIBDIR%%/pkg/sub/__pycache__",
                "@dirrm %%PYTHON_SITELIBDIR%%/pkg/sub",
                "@dirrm %%PYTHON_SITELIBDIR%%/pkg/__pycache__",
                "@dirrm %%PYTHON_SITELIBDIR%%/pkg",
            ]
        );
    }

    #[test]
    fn supplement_order() {
        let supplements = PlistSupplements {
            periodic_daily: vec!["scripts/500.cleanup".into()],
            configs: vec!["conf/app.conf.sample".into()],
            extra_modules: vec![ExtraModule::from(("scripts/foo.py", "${SITE}/pkg/"))],
            packages: vec!["app".into()],
            pycache_packages: vec![],
        };

        assert_eq!(
            supplements.lines(),
            vec![
                "etc/periodic/daily/500.cleanup",
                "etc/app.conf.sample",
                "%%SITE%%/pkg/foo.py",
                "@dirrm %%PYTHON_SITELIBDIR%%/app",
            ]
        );
    }

    #[test]
    fn append_preserves_base() -> Result<()> {
        let td = TempDir::new()?;
        let path = td.path().join("pkg-plist");

        write_plist(&path, &["bin/tool", "bin/tool"])?;

        let supplements = PlistSupplements {
            configs: vec!["tool.conf".into()],
            packages: vec!["tool".into()],
            ..Default::default()
        };
        supplements.append_to_file(&path)?;

        assert_eq!(
            std::fs::read_to_string(&path)?,
            indoc! {"
                bin/tool
                bin/tool
                etc/tool.conf
                @dirrm %%PYTHON_SITELIBDIR%%/tool
            "}
        );

        Ok(())
    }

    #[test]
    fn rewrite_record() {
        let record = indoc! {"
            /usr/local/lib/python3.9/site-packages/foo/__init__.py
            /usr/local/lib/python3.9/site-packages/foo/__pycache__/__init__.cpython-39.pyc
            /usr/local/lib/python3.9/site-packages/foo/sub/__init__.py
            /usr/local/lib/python3.9/site-packages/foo-1.0-py3.9.egg-info
            /usr/local/lib/python3.9/site-packages/foo-1.0-py3.9.egg-info/
            /usr/local/lib/python3.9/site-packages-other/x.py
            /usr/local/bin/foo-tool

            /opt/elsewhere/file
        "};

        assert_eq!(
            rewrite_install_record(
                record,
                "/usr/local/",
                "/usr/local/lib/python3.9/site-packages"
            ),
            vec![
                "%%PYTHON_SITELIBDIR%%/foo/__init__.py",
                "%%PYTHON_SITELIBDIR%%/foo/__pycache__/__init__.cpython-39.pyc",
                "%%PYTHON_SITELIBDIR%%/foo/sub/__init__.py",
                "lib/python3.9/site-packages-other/x.py",
                "bin/foo-tool",
                "/opt/elsewhere/file",
            ]
        );
    }

    #[test]
    fn packages_from_record() {
        let lines = vec![
            "%%PYTHON_SITELIBDIR%%/foo/__init__.py",
            "%%PYTHON_SITELIBDIR%%/foo/sub/__init__.py",
            "%%PYTHON_SITELIBDIR%%/foo/sub/mod.py",
            "%%PYTHON_SITELIBDIR%%/single.py",
            "bin/foo-tool",
        ];

        assert_eq!(packages_from_plist(&lines), vec!["foo", "foo.sub"]);
    }
}
