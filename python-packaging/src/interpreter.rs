// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Functionality related to running Python interpreters. */

use {
    anyhow::{anyhow, Context, Result},
    duct::cmd,
    log::{info, warn},
    std::{
        io::{BufRead, BufReader},
        path::{Path, PathBuf},
    },
};

/// Python code printing the install locations we care about, one per line.
const LAYOUT_SCRIPT: &str = "\
import sys, sysconfig
print(sys.prefix)
print(sysconfig.get_paths()['purelib'])
print('%d.%d' % sys.version_info[:2])
";

/// Where an interpreter installs distributions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PythonInstallLayout {
    /// `sys.prefix`.
    pub prefix: String,

    /// Directory pure Python packages are installed into.
    pub site_packages: String,

    /// `X.Y` version of the interpreter.
    pub version: String,
}

impl PythonInstallLayout {
    /// Ask a Python interpreter for its install layout.
    pub fn query(python_exe: &Path) -> Result<Self> {
        let output = cmd(python_exe, ["-c", LAYOUT_SCRIPT])
            .read()
            .with_context(|| format!("querying install layout of {}", python_exe.display()))?;

        Self::from_layout_output(&output)
    }

    /// Parse the output of the layout script.
    pub fn from_layout_output(output: &str) -> Result<Self> {
        let mut lines = output.lines().map(|l| l.trim()).filter(|l| !l.is_empty());

        let mut next = |what: &str| {
            lines
                .next()
                .map(|s| s.to_string())
                .ok_or_else(|| anyhow!("interpreter did not report {}", what))
        };

        Ok(Self {
            prefix: next("sys.prefix")?,
            site_packages: next("purelib path")?,
            version: next("version")?,
        })
    }
}

/// Run a command to completion, relaying its output to the log.
pub fn run_logged(program: &Path, args: &[&str], cwd: &Path) -> Result<()> {
    info!("running {} {}", program.display(), args.join(" "));

    let command = cmd(program, args)
        .dir(cwd)
        .stderr_to_stdout()
        .unchecked()
        .reader()
        .with_context(|| format!("invoking {}", program.display()))?;
    {
        let reader = BufReader::new(&command);
        for line in reader.lines() {
            info!("{}", line.context("reading command output")?);
        }
    }
    let output = command
        .try_wait()
        .context("waiting on process")?
        .ok_or_else(|| anyhow!("unable to wait on command"))?;
    if !output.status.success() {
        return Err(anyhow!(
            "{} {} failed: {}",
            program.display(),
            args.join(" "),
            output.status
        ));
    }

    Ok(())
}

/// Produce a `PKG-INFO` file for a `setup.py` based source tree.
///
/// Runs `setup.py egg_info` with its output directed to `dest_dir` and
/// returns the path of the generated `PKG-INFO`.
pub fn generate_pkg_info(python_exe: &Path, source_dir: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let egg_base = dest_dir.display().to_string();

    run_logged(
        python_exe,
        &["setup.py", "-q", "egg_info", "--egg-base", &egg_base],
        source_dir,
    )?;

    find_pkg_info(dest_dir)
}

/// `setup.py` arguments writing a source distribution into `dist_dir`.
pub fn sdist_args(dist_dir: &Path) -> Vec<String> {
    vec![
        "setup.py".to_string(),
        "sdist".to_string(),
        "--dist-dir".to_string(),
        dist_dir.display().to_string(),
    ]
}

/// Build a source distribution of a `setup.py` based source tree.
///
/// The archive lands in `dist_dir`, which is resolved against the current
/// directory when relative.
pub fn create_sdist(python_exe: &Path, source_dir: &Path, dist_dir: &Path) -> Result<()> {
    let dist_dir = if dist_dir.is_absolute() {
        dist_dir.to_path_buf()
    } else {
        std::env::current_dir()
            .context("resolving current directory")?
            .join(dist_dir)
    };

    let args = sdist_args(&dist_dir);
    let args = args.iter().map(|s| s.as_str()).collect::<Vec<_>>();

    run_logged(python_exe, &args, source_dir)
}

/// Locate `<name>.egg-info/PKG-INFO` under a directory.
pub fn find_pkg_info(dir: &Path) -> Result<PathBuf> {
    let mut candidates = vec![];

    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();

        if path
            .file_name()
            .map(|n| n.to_string_lossy().ends_with(".egg-info"))
            .unwrap_or(false)
        {
            let pkg_info = path.join("PKG-INFO");
            if pkg_info.is_file() {
                candidates.push(pkg_info);
            }
        }
    }

    candidates.sort();

    if candidates.len() > 1 {
        warn!(
            "multiple egg-info directories in {}; using {}",
            dir.display(),
            candidates[0].display()
        );
    }

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no egg-info/PKG-INFO found in {}", dir.display()))
}
