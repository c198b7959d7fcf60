// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Locating ports in a FreeBSD ports tree.

A ports tree is a two level hierarchy: `<root>/<category>/<port>/Makefile`.
Resolution maps a bare distribution name onto a port directory and the
package name that port produces.
 */

use {
    crate::error::{FreeBsdError, Result},
    glob::Pattern,
    log::{debug, warn},
    std::path::{Component, Path, PathBuf},
};

/// Default location of the ports tree.
pub const DEFAULT_PORTS_DIR: &str = "/usr/ports";

/// Environment variable overriding the ports tree location.
pub const PORTSDIR_ENV: &str = "PORTSDIR";

/// Prefix of Python ports in the ports tree.
pub const PYTHON_PORT_PREFIX: &str = "py-";

/// How a port was found.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolution {
    /// Exactly one category holds the port.
    Exact,

    /// Several categories hold a port of this name. Holds all of them, sorted.
    ///
    /// The first one is used.
    Ambiguous(Vec<String>),

    /// No port was found and a placeholder path was synthesized.
    Fallback,
}

/// The result of resolving a name against a ports tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedPort {
    /// Package name the port produces (`PKGNAMEPREFIX` + `PORTNAME` + `PKGNAMESUFFIX`).
    pub canonical_name: String,

    /// Path of the port relative to the tree root, with a leading `/`.
    ///
    /// e.g. `/misc/py-foo`.
    pub relative_path: String,

    pub resolution: Resolution,
}

impl ResolvedPort {
    /// Whether the port was synthesized rather than found.
    pub fn is_fallback(&self) -> bool {
        self.resolution == Resolution::Fallback
    }

    /// Category component of the relative path.
    pub fn category(&self) -> &str {
        self.relative_path
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default()
    }
}

/// Something that can map a dependency name to a port.
///
/// Resolution never fails because a port is missing; implementations produce a
/// [Resolution::Fallback] instead. Errors are reserved for I/O problems.
pub trait PortResolver {
    fn resolve(&self, name: &str, default_category: &str) -> Result<ResolvedPort>;
}

/// A ports tree on the local filesystem.
#[derive(Clone, Debug)]
pub struct PortsTree {
    root: PathBuf,
}

impl PortsTree {
    /// Construct an instance rooted at the given directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        // Normalizes away trailing separators and `.` components.
        let root = root
            .as_ref()
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect::<PathBuf>();

        Self { root }
    }

    /// Construct an instance from the `PORTSDIR` environment variable or the default location.
    pub fn from_env() -> Self {
        match std::env::var_os(PORTSDIR_ENV) {
            Some(dir) if !dir.is_empty() => Self::new(dir),
            _ => Self::new(DEFAULT_PORTS_DIR),
        }
    }

    /// The root directory of the tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find all `<category>/<name>` directories.
    ///
    /// Results are sorted by path, which makes the category order lexicographic.
    pub fn find_port_dirs(&self, name: &str) -> Result<Vec<PathBuf>> {
        let pattern = format!(
            "{}/*/{}",
            Pattern::escape(&self.root.display().to_string()),
            Pattern::escape(name)
        );

        let mut dirs = vec![];
        for entry in glob::glob(&pattern)? {
            let path = entry?;
            if path.is_dir() {
                dirs.push(path);
            }
        }

        dirs.sort();

        Ok(dirs)
    }

    /// Express a path inside the tree relative to its root, with a leading `/`.
    fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);

        let parts = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(p) => Some(p.to_string_lossy().to_string()),
                _ => None,
            })
            .collect::<Vec<_>>();

        format!("/{}", parts.join("/"))
    }

    /// Read the package name produced by a port directory.
    pub fn read_port_name(&self, port_dir: &Path) -> Result<String> {
        let makefile = port_dir.join("Makefile");

        let data = std::fs::read_to_string(&makefile)
            .map_err(|e| FreeBsdError::IoPath(makefile.display().to_string(), e))?;

        Ok(package_name_from_makefile(&data))
    }
}

impl PortResolver for PortsTree {
    fn resolve(&self, name: &str, default_category: &str) -> Result<ResolvedPort> {
        let dirs = self.find_port_dirs(name)?;

        let resolution = match dirs.len() {
            0 => {
                if !name.starts_with(PYTHON_PORT_PREFIX) {
                    debug!(
                        "no port named '{}'; retrying as '{}{}'",
                        name, PYTHON_PORT_PREFIX, name
                    );
                    return self.resolve(&format!("{}{}", PYTHON_PORT_PREFIX, name), default_category);
                }

                warn!(
                    "can't find any directory for '{}', using category '{}'",
                    name, default_category
                );

                return Ok(ResolvedPort {
                    canonical_name: name.to_string(),
                    relative_path: format!("/{}/{}", default_category, name),
                    resolution: Resolution::Fallback,
                });
            }
            1 => Resolution::Exact,
            _ => {
                let categories = dirs
                    .iter()
                    .map(|d| self.relative_path(d))
                    .map(|p| {
                        p.trim_start_matches('/')
                            .split('/')
                            .next()
                            .unwrap_or_default()
                            .to_string()
                    })
                    .collect::<Vec<_>>();

                warn!(
                    "more than one category for '{}' ({}); using '{}'",
                    name,
                    categories.join(", "),
                    categories[0]
                );

                Resolution::Ambiguous(categories)
            }
        };

        let port_dir = &dirs[0];

        Ok(ResolvedPort {
            canonical_name: self.read_port_name(port_dir)?,
            relative_path: self.relative_path(port_dir),
            resolution,
        })
    }
}

/// Compute the package name from the content of a port's Makefile.
///
/// Only simple `KEY=VALUE` assignments are understood. Later assignments win and
/// variable references are left unexpanded.
pub fn package_name_from_makefile(data: &str) -> String {
    let mut portname = "";
    let mut prefix = "";
    let mut suffix = "";

    for line in data.lines() {
        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => continue,
        };

        match key {
            "PORTNAME" => portname = value,
            "PKGNAMEPREFIX" => prefix = value,
            "PKGNAMESUFFIX" => suffix = value,
            _ => {}
        }
    }

    format!("{}{}{}", prefix, portname, suffix)
}

#[cfg(test)]
mod tests {
    use {super::*, indoc::indoc, tempfile::TempDir};

    fn add_port(root: &Path, category: &str, dir: &str, makefile: &str) -> Result<()> {
        let port = root.join(category).join(dir);
        std::fs::create_dir_all(&port)?;
        std::fs::write(port.join("Makefile"), makefile)?;

        Ok(())
    }

    #[test]
    fn package_name() {
        assert_eq!(
            package_name_from_makefile(indoc! {"
                # Created by: somebody
                PORTNAME=\tfoo
                PORTVERSION=\t1.0
                PKGNAMEPREFIX=\tpy-
                PKGNAMESUFFIX= -devel
                .include <bsd.port.mk>
            "}),
            "py-foo-devel"
        );
        assert_eq!(package_name_from_makefile("PORTNAME=bar\n"), "bar");
        assert_eq!(package_name_from_makefile("COMMENT=nothing\n"), "");
    }

    #[test]
    fn resolve_exact() -> Result<()> {
        let td = TempDir::new()?;
        add_port(td.path(), "www", "apache24", "PORTNAME=apache24\n")?;

        let tree = PortsTree::new(td.path());
        let port = tree.resolve("apache24", "misc")?;

        assert_eq!(
            port,
            ResolvedPort {
                canonical_name: "apache24".into(),
                relative_path: "/www/apache24".into(),
                resolution: Resolution::Exact,
            }
        );
        assert_eq!(port.category(), "www");

        Ok(())
    }

    #[test]
    fn resolve_retries_with_python_prefix() -> Result<()> {
        let td = TempDir::new()?;
        add_port(
            td.path(),
            "misc",
            "py-foo",
            "PORTNAME=foo\nPKGNAMEPREFIX=py-\n",
        )?;

        let tree = PortsTree::new(td.path());
        let port = tree.resolve("foo", "misc")?;

        assert_eq!(port.canonical_name, "py-foo");
        assert_eq!(port.relative_path, "/misc/py-foo");
        assert_eq!(port.resolution, Resolution::Exact);

        Ok(())
    }

    #[test]
    fn resolve_fallback() -> Result<()> {
        let td = TempDir::new()?;
        std::fs::create_dir_all(td.path().join("misc"))?;

        let tree = PortsTree::new(td.path());

        let port = tree.resolve("missing", "devel")?;
        assert_eq!(port.canonical_name, "py-missing");
        assert_eq!(port.relative_path, "/devel/py-missing");
        assert!(port.is_fallback());

        let port = tree.resolve("py-missing", "misc")?;
        assert_eq!(port.canonical_name, "py-missing");
        assert_eq!(port.relative_path, "/misc/py-missing");
        assert!(port.is_fallback());

        Ok(())
    }

    #[test]
    fn resolve_ambiguous_picks_first_category() -> Result<()> {
        let td = TempDir::new()?;
        add_port(td.path(), "www", "py-bar", "PORTNAME=bar-www\n")?;
        add_port(td.path(), "devel", "py-bar", "PORTNAME=bar-devel\n")?;
        add_port(td.path(), "net", "py-bar", "PORTNAME=bar-net\n")?;

        let tree = PortsTree::new(td.path());
        let port = tree.resolve("py-bar", "misc")?;

        assert_eq!(port.canonical_name, "bar-devel");
        assert_eq!(port.relative_path, "/devel/py-bar");
        assert_eq!(
            port.resolution,
            Resolution::Ambiguous(vec!["devel".into(), "net".into(), "www".into()])
        );

        Ok(())
    }

    #[test]
    fn root_trailing_separator_ignored() -> Result<()> {
        let td = TempDir::new()?;
        add_port(td.path(), "misc", "baz", "PORTNAME=baz\n")?;

        let root = format!("{}/", td.path().display());
        let tree = PortsTree::new(&root);

        assert_eq!(tree.root(), td.path());
        assert_eq!(tree.resolve("baz", "misc")?.relative_path, "/misc/baz");

        Ok(())
    }

    #[test]
    fn plain_files_are_not_ports() -> Result<()> {
        let td = TempDir::new()?;
        std::fs::create_dir_all(td.path().join("misc"))?;
        std::fs::write(td.path().join("misc").join("py-qux"), "not a port")?;

        let tree = PortsTree::new(td.path());
        assert!(tree.resolve("qux", "misc")?.is_fallback());

        Ok(())
    }

    #[test]
    fn missing_makefile_is_an_error() -> Result<()> {
        let td = TempDir::new()?;
        std::fs::create_dir_all(td.path().join("misc").join("broken"))?;

        let tree = PortsTree::new(td.path());
        assert!(matches!(
            tree.resolve("broken", "misc"),
            Err(FreeBsdError::IoPath(_, _))
        ));

        Ok(())
    }
}
