// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Writing port `Makefile` and `pkg-descr` files. */

use {
    crate::{
        dependency::Translation,
        error::{FreeBsdError, Result},
        options::PortOptions,
        plist::{file_name, CONFIG_DIR, PERIODIC_DAILY_DIR},
    },
    python_packaging::package_metadata::DistributionDescriptor,
    std::{io::Write, path::Path},
};

/// Category used when the distribution doesn't declare any.
pub const DEFAULT_PORT_CATEGORY: &str = "misc";

/// An ordered list of Makefile lines.
///
/// Entries are `(key, value)` pairs. An empty value suppresses the entry and
/// an empty key writes the value as a bare line.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MakefileWriter {
    entries: Vec<(String, String)>,
}

impl MakefileWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `KEY = VALUE` assignment.
    pub fn variable(&mut self, key: impl ToString, value: impl ToString) -> &mut Self {
        self.entries.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a bare line (directive, target or free form text).
    pub fn line(&mut self, value: impl ToString) -> &mut Self {
        self.entries.push((String::new(), value.to_string()));
        self
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Render to Makefile text.
    pub fn render(&self) -> String {
        let mut s = String::new();

        for (key, value) in &self.entries {
            if value.is_empty() {
                continue;
            }

            if key.is_empty() {
                s.push_str(value);
            } else {
                s.push_str(&format!("{} = {}", key, value));
            }
            s.push('\n');
        }

        s
    }

    /// Write rendered content to a file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let io_err = |e: std::io::Error| FreeBsdError::IoPath(path.display().to_string(), e);

        let mut fh = std::fs::File::create(path).map_err(io_err)?;
        fh.write_all(self.render().as_bytes()).map_err(io_err)?;

        Ok(())
    }
}

/// Render a make target. Empty when there are no commands.
fn make_target(name: &str, commands: &[String]) -> String {
    if commands.is_empty() {
        String::new()
    } else {
        let mut lines = vec![format!("\n{}:", name)];
        lines.extend(commands.iter().cloned());

        lines.join("\n\t")
    }
}

/// Builds the `Makefile` of a port for a Python distribution.
pub struct PortMakefile<'a> {
    descriptor: &'a DistributionDescriptor,
    options: &'a PortOptions,
    translation: &'a Translation,
}

impl<'a> PortMakefile<'a> {
    pub fn new(
        descriptor: &'a DistributionDescriptor,
        options: &'a PortOptions,
        translation: &'a Translation,
    ) -> Self {
        Self {
            descriptor,
            options,
            translation,
        }
    }

    /// Ports categories.
    ///
    /// Trove classifiers (`Topic :: ...`) aren't ports categories and are ignored.
    pub fn categories(&self) -> String {
        let categories = self
            .descriptor
            .classifiers
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty() && !c.contains("::") && !c.contains(char::is_whitespace))
            .collect::<Vec<_>>();

        if categories.is_empty() {
            DEFAULT_PORT_CATEGORY.to_string()
        } else {
            categories.join(" ")
        }
    }

    /// One line description.
    pub fn comment(&self) -> String {
        let summary = self.descriptor.summary.as_deref().unwrap_or_default();

        match self.options.brief_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => {
                if summary.is_empty() {
                    prefix.to_string()
                } else {
                    format!("{} {}", prefix, summary)
                }
            }
            _ => summary.to_string(),
        }
    }

    pub fn use_python(&self) -> String {
        match &self.options.python_min_version {
            Some(version) => format!("{}+", version),
            None => "yes".to_string(),
        }
    }

    pub fn install_args(&self) -> &'static str {
        if self.options.optimize {
            "-c -O1 --prefix=${PREFIX}"
        } else {
            "-c --prefix=${PREFIX}"
        }
    }

    fn pkg_name_prefix(&self) -> &'static str {
        if self.options.name_prefix {
            "${PYTHON_PKGNAMEPREFIX}"
        } else {
            ""
        }
    }

    fn pkg_name_suffix(&self) -> &'static str {
        if self.options.name_suffix {
            "${PYTHON_PKGNAMESUFFIX}"
        } else {
            ""
        }
    }

    pub fn pre_install(&self) -> String {
        let mut commands = vec![];

        if self.options.pkg_install.is_some() {
            commands.push("PKG_PREFIX=${PREFIX} ${SH} ${PKGINSTALL} ${PKGNAME} PRE-INSTALL".into());
        }

        make_target("pre-install", &commands)
    }

    pub fn post_install(&self) -> String {
        let mut commands = vec![];

        if !self.options.periodic_daily.is_empty() {
            commands.push(format!("${{MKDIR}} ${{PREFIX}}/{}", PERIODIC_DAILY_DIR));
        }
        for script in &self.options.periodic_daily {
            commands.push(format!(
                "${{INSTALL_SCRIPT}} ${{FILESDIR}}/{} ${{PREFIX}}/{}",
                file_name(script),
                PERIODIC_DAILY_DIR
            ));
        }
        for config in &self.options.configs {
            commands.push(format!(
                "${{INSTALL_DATA}} ${{FILESDIR}}/{} ${{PREFIX}}/{}",
                file_name(config),
                CONFIG_DIR
            ));
        }
        if self.options.pkg_install.is_some() {
            commands.push("PKG_PREFIX=${PREFIX} ${SH} ${PKGINSTALL} ${PKGNAME} POST-INSTALL".into());
        }
        for module in &self.options.extra_modules {
            commands.push(format!(
                "${{INSTALL_DATA}} ${{FILESDIR}}/{} {}",
                file_name(&module.source),
                module.destination
            ));
        }

        make_target("post-install", &commands)
    }

    pub fn pre_deinstall(&self) -> String {
        let mut commands = vec![];

        if self.options.pkg_deinstall.is_some() {
            commands.push(
                "PKG_PREFIX=${PREFIX} ${SH} ${PKGDEINSTALL} ${PKGNAME} PRE-DEINSTALL".into(),
            );
        }

        make_target("pre-deinstall", &commands)
    }

    pub fn post_deinstall(&self) -> String {
        let mut commands = vec![];

        if self.options.pkg_deinstall.is_some() {
            commands.push(
                "PKG_PREFIX=${PREFIX} ${SH} ${PKGDEINSTALL} ${PKGNAME} POST-DEINSTALL".into(),
            );
        }

        make_target("post-deinstall", &commands)
    }

    /// Obtain the Makefile content.
    pub fn writer(&self) -> MakefileWriter {
        let mut w = MakefileWriter::new();

        w.variable("PORTNAME", &self.descriptor.name)
            .variable("PORTVERSION", &self.descriptor.version)
            .variable("PKGNAMESUFFIX", self.pkg_name_suffix())
            .variable("PKGNAMEPREFIX", self.pkg_name_prefix())
            .variable("CATEGORIES", self.categories())
            .variable(
                "MASTER_SITES",
                self.descriptor.home_page.as_deref().unwrap_or_default(),
            )
            .variable(
                "MAINTAINER",
                self.descriptor.contact_email().unwrap_or_default(),
            )
            .variable("COMMENT", self.comment())
            .variable("RUN_DEPENDS", self.translation.run_block())
            .line(self.translation.use_block())
            .variable("USE_PYTHON", self.use_python())
            .variable("USE_PYDISTUTILS", "yes")
            .variable("USE_RC_SUBR", self.options.rc_names().join(" "))
            .line(self.pre_install())
            .line(self.post_install())
            .line(self.pre_deinstall())
            .line(self.post_deinstall())
            .line(".include <bsd.port.pre.mk>")
            .line("PYTHON_CMD = ${PYTHONBASE}/bin/${PYTHON_VERSION}")
            .variable("PYDISTUTILS_INSTALLARGS", self.install_args())
            .line(".include <bsd.port.post.mk>");

        w
    }
}

/// Content of the `pkg-descr` file: the long description.
pub fn pkg_descr(descriptor: &DistributionDescriptor) -> String {
    let text = descriptor
        .description
        .as_deref()
        .or(descriptor.summary.as_deref())
        .unwrap_or_default();

    if text.is_empty() || text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::plist::ExtraModule,
        indoc::indoc,
    };

    fn descriptor() -> DistributionDescriptor {
        DistributionDescriptor {
            name: "dist2free".into(),
            version: "0.0.1".into(),
            summary: Some("Creates pkg-plist, Makefile for FreeBSD package.".into()),
            description: Some("Module was developed to create FreeBSD package.".into()),
            home_page: Some("http://github.com/shigin/dist2free/tree/master".into()),
            author: Some("Alexander Shigin".into()),
            author_email: Some("shigin@rambler-co.ru".into()),
            classifiers: vec!["misc".into(), "Topic :: Software Development".into()],
            ..Default::default()
        }
    }

    #[test]
    fn writer_suppression_rules() {
        let mut w = MakefileWriter::new();
        w.variable("PORTNAME", "foo")
            .variable("EMPTY", "")
            .line("")
            .line(".include <bsd.port.mk>");

        assert_eq!(w.render(), "PORTNAME = foo\n.include <bsd.port.mk>\n");
        assert_eq!(w.entries().len(), 4);
    }

    #[test]
    fn minimal_makefile() {
        let descriptor = descriptor();
        let options = PortOptions {
            python_min_version: Some("2.5".into()),
            name_prefix: true,
            ..Default::default()
        };
        let translation = Translation {
            use_lines: vec!["USE_APACHE=2.0+".into()],
            run_lines: vec![
                "py-foo>=1.0:${PORTSDIR}/misc/py-foo".into(),
                "py-bar:${PORTSDIR}/devel/py-bar".into(),
            ],
            ..Default::default()
        };

        let makefile = PortMakefile::new(&descriptor, &options, &translation)
            .writer()
            .render();

        assert_eq!(
            makefile,
            indoc! {"
                PORTNAME = dist2free
                PORTVERSION = 0.0.1
                PKGNAMEPREFIX = ${PYTHON_PKGNAMEPREFIX}
                CATEGORIES = misc
                MASTER_SITES = http://github.com/shigin/dist2free/tree/master
                MAINTAINER = shigin@rambler-co.ru
                COMMENT = Creates pkg-plist, Makefile for FreeBSD package.
                RUN_DEPENDS = py-foo>=1.0:${PORTSDIR}/misc/py-foo \\
                \t\tpy-bar:${PORTSDIR}/devel/py-bar
                USE_APACHE=2.0+
                USE_PYTHON = 2.5+
                USE_PYDISTUTILS = yes
                .include <bsd.port.pre.mk>
                PYTHON_CMD = ${PYTHONBASE}/bin/${PYTHON_VERSION}
                PYDISTUTILS_INSTALLARGS = -c --prefix=${PREFIX}
                .include <bsd.port.post.mk>
            "}
        );
    }

    #[test]
    fn install_targets() {
        let descriptor = descriptor();
        let options = PortOptions {
            optimize: true,
            pkg_install: Some("pkg-install.sh".into()),
            pkg_deinstall: Some("pkg-deinstall.sh".into()),
            periodic_daily: vec!["scripts/500.cleanup".into()],
            configs: vec!["conf/app.conf".into()],
            rc_scripts: vec!["scripts/appd.sh".into(), "scripts/worker.sh".into()],
            extra_modules: vec![ExtraModule::from(("scripts/foo.py", "${SITE}/pkg/"))],
            brief_prefix: Some("Example:".into()),
            ..Default::default()
        };
        let translation = Translation::default();

        let makefile = PortMakefile::new(&descriptor, &options, &translation);

        assert_eq!(
            makefile.comment(),
            "Example: Creates pkg-plist, Makefile for FreeBSD package."
        );
        assert_eq!(makefile.install_args(), "-c -O1 --prefix=${PREFIX}");
        assert_eq!(makefile.use_python(), "yes");
        assert_eq!(
            makefile.pre_install(),
            "\npre-install:\n\tPKG_PREFIX=${PREFIX} ${SH} ${PKGINSTALL} ${PKGNAME} PRE-INSTALL"
        );
        assert_eq!(
            makefile.post_install(),
            indoc! {"

                post-install:
                \t${MKDIR} ${PREFIX}/etc/periodic/daily
                \t${INSTALL_SCRIPT} ${FILESDIR}/500.cleanup ${PREFIX}/etc/periodic/daily
                \t${INSTALL_DATA} ${FILESDIR}/app.conf ${PREFIX}/etc
                \tPKG_PREFIX=${PREFIX} ${SH} ${PKGINSTALL} ${PKGNAME} POST-INSTALL
                \t${INSTALL_DATA} ${FILESDIR}/foo.py ${SITE}/pkg/"}
        );
        assert_eq!(
            makefile.post_deinstall(),
            "\npost-deinstall:\n\tPKG_PREFIX=${PREFIX} ${SH} ${PKGDEINSTALL} ${PKGNAME} POST-DEINSTALL"
        );

        let writer = makefile.writer();
        let entries = writer.entries();
        let pre_mk = entries
            .iter()
            .position(|(_, v)| v == ".include <bsd.port.pre.mk>")
            .unwrap();
        assert_eq!(
            entries[pre_mk - 1],
            (String::new(), makefile.post_deinstall())
        );

        let rendered = writer.render();
        assert!(rendered.contains("USE_RC_SUBR = appd worker\n"));
        assert!(rendered.contains("\npre-deinstall:\n\t"));
        assert!(!rendered.contains("RUN_DEPENDS"));
    }

    #[test]
    fn categories_default() {
        let mut descriptor = descriptor();
        descriptor.classifiers = vec!["Programming Language :: Python".into()];

        let options = PortOptions::default();
        let translation = Translation::default();

        assert_eq!(
            PortMakefile::new(&descriptor, &options, &translation).categories(),
            "misc"
        );

        descriptor.classifiers = vec!["www".into(), "python".into()];
        assert_eq!(
            PortMakefile::new(&descriptor, &options, &translation).categories(),
            "www python"
        );
    }

    #[test]
    fn descr() {
        let mut descriptor = descriptor();
        assert_eq!(
            pkg_descr(&descriptor),
            "Module was developed to create FreeBSD package.\n"
        );

        descriptor.description = None;
        assert_eq!(
            pkg_descr(&descriptor),
            "Creates pkg-plist, Makefile for FreeBSD package.\n"
        );
    }
}
