// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Assemble a port directory for a Python distribution.

A built port directory looks like:

```text
Makefile
pkg-descr
pkg-plist
pkg-install      (optional)
pkg-deinstall    (optional)
files/           rc scripts (as <name>.in), configs, periodic scripts, extra modules
```
 */

use {
    crate::{
        dependency::{DependencyTranslator, Translation},
        error::{FreeBsdError, Result},
        makefile::{pkg_descr, PortMakefile},
        options::{rc_name, PortOptions},
        plist::{
            file_name, packages_from_plist, pycache_packages_from_plist, write_plist,
            PlistSupplements,
        },
        ports_tree::PortResolver,
        trial_install::TrialInstaller,
    },
    duct::cmd,
    log::{info, warn},
    python_packaging::package_metadata::DistributionDescriptor,
    std::{
        io::{BufRead, BufReader},
        path::{Path, PathBuf},
    },
};

/// Name of the shared link pointing at the most recently built port.
pub const SHARED_LINK_NAME: &str = "pkg";

/// Summary of a built port.
#[derive(Clone, Debug)]
pub struct BuiltPort {
    pub build_dir: PathBuf,
    pub translation: Translation,

    /// Every line written to `pkg-plist`.
    pub plist: Vec<String>,

    /// Files placed in the port directory, relative to it.
    pub files: Vec<String>,
}

/// Builds a port directory from a distribution and options.
pub struct PortBuilder {
    descriptor: DistributionDescriptor,
    options: PortOptions,
    source_dir: PathBuf,
    build_dir: PathBuf,
    link_path: Option<PathBuf>,
}

impl PortBuilder {
    /// Construct an instance.
    ///
    /// The port is built in `<source_dir>/build/<name>` and linked from
    /// `<source_dir>/build/pkg` unless configured otherwise.
    pub fn new(
        descriptor: DistributionDescriptor,
        options: PortOptions,
        source_dir: impl Into<PathBuf>,
    ) -> Self {
        let source_dir = source_dir.into();
        let build_dir = source_dir.join("build").join(&descriptor.name);
        let link_path = Some(source_dir.join("build").join(SHARED_LINK_NAME));

        Self {
            descriptor,
            options,
            source_dir,
            build_dir,
            link_path,
        }
    }

    /// Set the directory the port is written to.
    pub fn set_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    /// Set the shared link to the build directory. `None` disables linking.
    pub fn set_link_path(mut self, link_path: Option<PathBuf>) -> Self {
        self.link_path = link_path;
        self
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn options(&self) -> &PortOptions {
        &self.options
    }

    /// Translate the distribution's requirements.
    pub fn translate_dependencies<R: PortResolver + ?Sized>(
        &self,
        resolver: &R,
    ) -> Result<Translation> {
        DependencyTranslator::new(self.options.translation_policy(), resolver)
            .set_error_policy(self.options.error_policy)
            .translate(&self.descriptor.requires)
    }

    /// Build the port directory.
    pub fn build<R, I>(&self, resolver: &R, installer: &I) -> Result<BuiltPort>
    where
        R: PortResolver + ?Sized,
        I: TrialInstaller + ?Sized,
    {
        self.options.validate(&self.source_dir)?;

        let translation = self.translate_dependencies(resolver)?;

        std::fs::create_dir_all(&self.build_dir)
            .map_err(|e| FreeBsdError::IoPath(self.build_dir.display().to_string(), e))?;
        let mut files = vec![];

        info!("creating Makefile");
        PortMakefile::new(&self.descriptor, &self.options, &translation)
            .writer()
            .write_to(&self.build_dir.join("Makefile"))?;
        files.push("Makefile".to_string());

        info!("creating pkg-descr");
        self.write_file("pkg-descr", pkg_descr(&self.descriptor).as_bytes())?;
        files.push("pkg-descr".to_string());

        info!("running trial installation");
        let installed = installer.install(&self.source_dir, self.options.optimize)?;
        let plist_path = self.build_dir.join("pkg-plist");
        write_plist(&plist_path, &installed)?;

        info!("adding extra files to pkg-plist");
        let supplements = self.plist_supplements(&installed);
        supplements.append_to_file(&plist_path)?;
        files.push("pkg-plist".to_string());

        let mut plist = installed;
        plist.extend(supplements.lines());

        files.extend(self.copy_package_scripts()?);
        files.extend(self.copy_files()?);

        if let Some(link_path) = &self.link_path {
            link_build_dir(&self.build_dir, link_path)?;
        }

        info!(
            "now you can copy files from {} and run make package",
            self.build_dir.display()
        );

        Ok(BuiltPort {
            build_dir: self.build_dir.clone(),
            translation,
            plist,
            files,
        })
    }

    /// Entries appended to the trial installation's plist.
    pub fn plist_supplements<S: AsRef<str>>(&self, installed: &[S]) -> PlistSupplements {
        let packages = match &self.options.packages {
            Some(packages) => packages.clone(),
            None => packages_from_plist(installed),
        };

        PlistSupplements {
            periodic_daily: self.options.periodic_daily.clone(),
            configs: self.options.configs.clone(),
            extra_modules: self.options.extra_modules.clone(),
            packages,
            pycache_packages: pycache_packages_from_plist(installed),
        }
    }

    fn write_file(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.build_dir.join(name);

        std::fs::write(&path, data).map_err(|e| FreeBsdError::IoPath(path.display().to_string(), e))
    }

    fn copy_into(&self, source: &Path, dest: &Path) -> Result<()> {
        let source = PortOptions::source_path(&self.source_dir, source);

        info!("copying {} -> {}", source.display(), dest.display());
        std::fs::copy(&source, dest)
            .map_err(|e| FreeBsdError::IoPath(source.display().to_string(), e))?;

        Ok(())
    }

    /// Copy `pkg-install` and `pkg-deinstall` scripts.
    fn copy_package_scripts(&self) -> Result<Vec<String>> {
        let mut copied = vec![];

        for (source, name) in [
            (&self.options.pkg_install, "pkg-install"),
            (&self.options.pkg_deinstall, "pkg-deinstall"),
        ] {
            if let Some(source) = source {
                self.copy_into(source, &self.build_dir.join(name))?;
                copied.push(name.to_string());
            }
        }

        Ok(copied)
    }

    /// Copy auxiliary files into `files/`.
    ///
    /// rc scripts are renamed to `<service>.in`; everything else keeps its file name.
    fn copy_files(&self) -> Result<Vec<String>> {
        let files_dir = self.build_dir.join("files");
        let mut copied = vec![];

        let mut sources = self
            .options
            .rc_scripts
            .iter()
            .map(|s| (s.as_str(), format!("{}.in", rc_name(s))))
            .collect::<Vec<_>>();

        sources.extend(
            self.options
                .configs
                .iter()
                .chain(self.options.periodic_daily.iter())
                .chain(self.options.extra_modules.iter().map(|m| &m.source))
                .map(|s| (s.as_str(), file_name(s).to_string())),
        );

        if sources.is_empty() {
            return Ok(copied);
        }

        std::fs::create_dir_all(&files_dir)
            .map_err(|e| FreeBsdError::IoPath(files_dir.display().to_string(), e))?;

        for (source, name) in sources {
            self.copy_into(Path::new(source), &files_dir.join(&name))?;
            copied.push(format!("files/{}", name));
        }

        Ok(copied)
    }
}

/// Point a shared symlink at a build directory.
///
/// An existing symlink is left alone.
pub fn link_build_dir(build_dir: &Path, link_path: &Path) -> Result<()> {
    match std::fs::symlink_metadata(link_path) {
        Ok(metadata) if metadata.file_type().is_symlink() => {
            info!("{} is already a link; leaving it", link_path.display());
            return Ok(());
        }
        Ok(_) => {
            warn!(
                "{} exists and is not a link; not linking {}",
                link_path.display(),
                build_dir.display()
            );
            return Ok(());
        }
        Err(_) => {}
    }

    if let Some(parent) = link_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| FreeBsdError::IoPath(parent.display().to_string(), e))?;
    }

    // Relative targets resolve against the link's directory, not ours.
    let target = absolute_path(build_dir)?;

    info!("linking {} to {}", link_path.display(), target.display());
    symlink_dir(&target, link_path)
        .map_err(|e| FreeBsdError::IoPath(link_path.display().to_string(), e))
}

/// Anchor a relative path at the current directory.
///
/// Unlike [std::fs::canonicalize], the path doesn't have to exist.
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

/// Arguments to `make` building a package from distfiles in `dist_dir`.
///
/// `make` runs in the port directory, so `DISTDIR` is always absolute.
pub fn make_package_args(dist_dir: &Path) -> Result<Vec<String>> {
    let dist_dir = absolute_path(dist_dir)?;

    Ok(vec![
        format!(
            "DISTDIR={}/",
            dist_dir.display().to_string().trim_end_matches('/')
        ),
        "install".to_string(),
        "package".to_string(),
    ])
}

/// Run `make install package` in a built port directory.
pub fn make_package(build_dir: &Path, dist_dir: &Path) -> Result<()> {
    let args = make_package_args(dist_dir)?;

    info!("make in {}", build_dir.display());

    let command = cmd("make", &args)
        .dir(build_dir)
        .stderr_to_stdout()
        .unchecked()
        .reader()?;
    {
        let reader = BufReader::new(&command);
        for line in reader.lines() {
            info!("{}", line?);
        }
    }
    let output = command
        .try_wait()?
        .ok_or_else(|| FreeBsdError::Command("unable to wait on make".into()))?;
    if !output.status.success() {
        return Err(FreeBsdError::Command(format!(
            "make {} failed: {}",
            args.join(" "),
            output.status
        )));
    }

    Ok(())
}
