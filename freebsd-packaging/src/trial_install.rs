// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Trial installations producing the base package list.

The files a distribution installs are only known by installing it. A trial
installation runs `setup.py install` into a scratch root and converts the
resulting install record into plist lines.
 */

use {
    crate::{
        error::{FreeBsdError, Result},
        plist::rewrite_install_record,
    },
    log::info,
    python_packaging::interpreter::{run_logged, PythonInstallLayout},
    std::path::{Path, PathBuf},
};

/// Something that can tell which files a distribution installs.
pub trait TrialInstaller {
    /// Install the distribution in `source_dir` somewhere harmless.
    ///
    /// Returns plist lines relative to `${PREFIX}`.
    fn install(&self, source_dir: &Path, optimize: bool) -> Result<Vec<String>>;
}

/// Runs `setup.py install` with a Python interpreter.
#[derive(Clone, Debug)]
pub struct SetupPyInstaller {
    python_exe: PathBuf,
}

impl SetupPyInstaller {
    pub fn new(python_exe: impl Into<PathBuf>) -> Self {
        Self {
            python_exe: python_exe.into(),
        }
    }

    pub fn python_exe(&self) -> &Path {
        &self.python_exe
    }
}

impl TrialInstaller for SetupPyInstaller {
    fn install(&self, source_dir: &Path, optimize: bool) -> Result<Vec<String>> {
        let layout = PythonInstallLayout::query(&self.python_exe)
            .map_err(|e| FreeBsdError::TrialInstall(format!("{:#}", e)))?;

        let temp_dir = tempfile::Builder::new().prefix("pkg.").tempdir()?;
        let root = temp_dir.path().display().to_string();
        let record_path = temp_dir.path().join("pkg-plist");
        let record = record_path.display().to_string();

        let mut args = vec!["setup.py", "install"];
        if optimize {
            args.push("-O1");
        }
        args.extend(["--root", root.as_str(), "--record", record.as_str()]);

        run_logged(&self.python_exe, &args, source_dir)
            .map_err(|e| FreeBsdError::TrialInstall(format!("{:#}", e)))?;

        let data = std::fs::read_to_string(&record_path)
            .map_err(|e| FreeBsdError::IoPath(record_path.display().to_string(), e))?;

        let lines = rewrite_install_record(&data, &layout.prefix, &layout.site_packages);
        info!("trial installation recorded {} entries", lines.len());

        Ok(lines)
    }
}
