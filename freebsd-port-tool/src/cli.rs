// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    clap::{value_parser, Arg, ArgAction, ArgMatches, Command},
    freebsd_packaging::{
        dependency::{DependencyTranslator, ErrorPolicy, TranslationPolicy, DEFAULT_CATEGORY},
        error::FreeBsdError,
        makefile::MakefileWriter,
        options::PortOptions,
        port_builder::{absolute_path, make_package, PortBuilder},
        ports_tree::{PortResolver, PortsTree},
        trial_install::SetupPyInstaller,
    },
    log::{info, warn, LevelFilter},
    python_packaging::{
        interpreter::{create_sdist, generate_pkg_info},
        package_metadata::PythonPackageMetadata,
    },
    std::path::{Path, PathBuf},
    thiserror::Error,
};

const BUILD_PORT_ABOUT: &str = "\
Generate a FreeBSD port for a Python distribution.

The distribution's metadata is read from a PKG-INFO file. When --metadata
isn't given, `setup.py egg_info` is run in the source directory to produce
one.

The port is written to `<source-dir>/build/<name>` unless --build-dir is
given. A trial installation of the distribution into a scratch directory
determines the content of pkg-plist.

# YAML Configuration

--config points at a YAML file controlling port generation. All keys are
optional. Relative paths are relative to the source directory.

optimize (bool)
   Byte compile installed modules with -O1.

python_min_version (string)
   Minimum Python version, e.g. \"3.8\". Must be quoted.

pkg_install / pkg_deinstall (string)
   Scripts run around installation and deinstallation.

periodic_daily (list[string])
   Scripts installed into etc/periodic/daily.

rc_scripts (list[string])
   rc.d scripts. Installed as files/<name>.in.

configs (list[string])
   Files installed into etc.

extra_modules (list[{source, destination}])
   Files installed to arbitrary destinations. A destination ending in `/`
   is a directory.

name_prefix / name_suffix (bool)
   Add ${PYTHON_PKGNAMEPREFIX} / ${PYTHON_PKGNAMESUFFIX} to the package name.

brief_prefix (string)
   Text prepended to the one line description.

packages (list[string])
   Python packages whose directories are removed on deinstall. Derived from
   the trial installation when not set.

ports_dir (string)
   Location of the ports tree.

use_flags (map[string, string])
   Extra distribution name to USE_* flag mappings.

default_category (string)
   Category for dependencies not found in the ports tree.

error_policy (abort | skip)
   What to do with dependencies that can't be translated.
";

const TRANSLATE_DEPS_ABOUT: &str = "\
Translate Python requirements to FreeBSD port dependencies.

Each DEP is a requirement expression such as `foo (>=1.0)` or `foo>=1.0`.
Requirements mapping to a USE_* flag are printed as flag assignments. The
rest are looked up in the ports tree and printed as a RUN_DEPENDS variable.
";

const MAKE_PACKAGE_ABOUT: &str = "\
Build a FreeBSD package from a generated port.

Runs `make DISTDIR=<dist-dir>/ install package` in the port directory. The
port's distfile is expected in --dist-dir.

With --source-dir, `setup.py sdist --dist-dir <dist-dir>` is run in the
source directory first so the distfile is there.
";

#[derive(Debug, Error)]
pub enum FptError {
    #[error("{0}")]
    FreeBsd(#[from] FreeBsdError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("error reading distribution metadata: {0}")]
    Metadata(String),

    #[error("{0}")]
    Python(String),

    #[error("invalid sub-command: {0}")]
    InvalidSubCommand(String),
}

pub type Result<T> = std::result::Result<T, FptError>;

fn ports_dir_arg() -> Arg {
    Arg::new("ports_dir")
        .long("ports-dir")
        .action(ArgAction::Set)
        .value_parser(value_parser!(PathBuf))
        .help("Path to the ports tree (defaults to $PORTSDIR or /usr/ports)")
}

fn ports_tree(args: &ArgMatches, configured: Option<&Path>) -> PortsTree {
    match args.get_one::<PathBuf>("ports_dir").map(|p| p.as_path()).or(configured) {
        Some(path) => PortsTree::new(path),
        None => PortsTree::from_env(),
    }
}

pub fn run_cli() -> Result<()> {
    let app = Command::new("FreeBSD Port Tool")
        .version("0.1")
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Generate FreeBSD ports for Python distributions")
        .arg_required_else_help(true);

    let app = app.arg(
        Arg::new("verbose")
            .long("verbose")
            .short('v')
            .global(true)
            .action(ArgAction::Count)
            .help("Increase logging verbosity. Can be specified multiple times."),
    );

    let app = app.subcommand(
        Command::new("build-port")
            .about("Generate a port directory for a Python distribution")
            .long_about(BUILD_PORT_ABOUT)
            .arg(
                Arg::new("source_dir")
                    .long("source-dir")
                    .action(ArgAction::Set)
                    .value_parser(value_parser!(PathBuf))
                    .required(true)
                    .help("Directory containing the distribution's setup.py"),
            )
            .arg(
                Arg::new("config")
                    .long("config")
                    .action(ArgAction::Set)
                    .value_parser(value_parser!(PathBuf))
                    .help("YAML file with port options"),
            )
            .arg(
                Arg::new("metadata")
                    .long("metadata")
                    .action(ArgAction::Set)
                    .value_parser(value_parser!(PathBuf))
                    .help("PKG-INFO file to read metadata from"),
            )
            .arg(
                Arg::new("build_dir")
                    .long("build-dir")
                    .action(ArgAction::Set)
                    .value_parser(value_parser!(PathBuf))
                    .help("Directory to write the port to"),
            )
            .arg(ports_dir_arg())
            .arg(
                Arg::new("python")
                    .long("python")
                    .action(ArgAction::Set)
                    .value_parser(value_parser!(PathBuf))
                    .default_value("python3")
                    .help("Python interpreter to run setup.py with"),
            )
            .arg(
                Arg::new("optimize")
                    .long("optimize")
                    .action(ArgAction::SetTrue)
                    .help("Byte compile installed modules with -O1"),
            ),
    );

    let app = app.subcommand(
        Command::new("translate-deps")
            .about("Translate Python requirements to port dependencies")
            .long_about(TRANSLATE_DEPS_ABOUT)
            .arg(ports_dir_arg())
            .arg(
                Arg::new("skip_unsupported")
                    .long("skip-unsupported")
                    .action(ArgAction::SetTrue)
                    .help("Skip requirements that can't be translated instead of failing"),
            )
            .arg(
                Arg::new("dep")
                    .action(ArgAction::Append)
                    .required(true)
                    .num_args(1..)
                    .help("Requirement expression"),
            ),
    );

    let app = app.subcommand(
        Command::new("resolve-port")
            .about("Find the port providing a package")
            .arg(ports_dir_arg())
            .arg(
                Arg::new("default_category")
                    .long("default-category")
                    .action(ArgAction::Set)
                    .default_value(DEFAULT_CATEGORY)
                    .help("Category to use when no port is found"),
            )
            .arg(
                Arg::new("name")
                    .action(ArgAction::Set)
                    .required(true)
                    .help("Package name"),
            ),
    );

    let mut app = app.subcommand(
        Command::new("make-package")
            .about("Run `make install package` in a generated port")
            .long_about(MAKE_PACKAGE_ABOUT)
            .arg(
                Arg::new("build_dir")
                    .long("build-dir")
                    .action(ArgAction::Set)
                    .value_parser(value_parser!(PathBuf))
                    .required(true)
                    .help("Port directory to build"),
            )
            .arg(
                Arg::new("dist_dir")
                    .long("dist-dir")
                    .action(ArgAction::Set)
                    .value_parser(value_parser!(PathBuf))
                    .required(true)
                    .help("Directory holding distribution files (DISTDIR)"),
            )
            .arg(
                Arg::new("source_dir")
                    .long("source-dir")
                    .action(ArgAction::Set)
                    .value_parser(value_parser!(PathBuf))
                    .help("Run `setup.py sdist` in this directory first"),
            )
            .arg(
                Arg::new("python")
                    .long("python")
                    .action(ArgAction::Set)
                    .value_parser(value_parser!(PathBuf))
                    .default_value("python3")
                    .help("Python interpreter to run setup.py with"),
            ),
    );

    let matches = app.clone().get_matches();

    let log_level = match matches.get_count("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();

    match matches.subcommand() {
        Some(("build-port", args)) => command_build_port(args),
        Some(("translate-deps", args)) => command_translate_deps(args),
        Some(("resolve-port", args)) => command_resolve_port(args),
        Some(("make-package", args)) => command_make_package(args),
        Some((command, _)) => Err(FptError::InvalidSubCommand(command.to_string())),
        None => {
            app.print_help()?;
            Ok(())
        }
    }
}

fn load_metadata(
    args: &ArgMatches,
    python_exe: &Path,
    source_dir: &Path,
) -> Result<PythonPackageMetadata> {
    let metadata = match args.get_one::<PathBuf>("metadata") {
        Some(path) => PythonPackageMetadata::from_path(path),
        None => {
            let temp_dir = tempfile::Builder::new().prefix("fpt-egg-info-").tempdir()?;

            generate_pkg_info(python_exe, source_dir, temp_dir.path())
                .and_then(|path| PythonPackageMetadata::from_path(&path))
        }
    };

    metadata.map_err(|e| FptError::Metadata(format!("{:#}", e)))
}

fn command_build_port(args: &ArgMatches) -> Result<()> {
    let source_dir = absolute_path(
        args.get_one::<PathBuf>("source_dir")
            .expect("source_dir argument is required"),
    )?;
    let python_exe = args
        .get_one::<PathBuf>("python")
        .expect("python argument has default value");

    let mut options = match args.get_one::<PathBuf>("config") {
        Some(path) => {
            info!("reading port options from {}", path.display());
            let f = std::fs::File::open(path)?;
            serde_yaml::from_reader::<_, PortOptions>(f)?
        }
        None => PortOptions::default(),
    };
    if args.get_flag("optimize") {
        options.optimize = true;
    }

    let descriptor = load_metadata(args, python_exe, &source_dir)?
        .descriptor()
        .map_err(|e| FptError::Metadata(format!("{:#}", e)))?;
    info!("generating port for {} {}", descriptor.name, descriptor.version);

    let tree = ports_tree(args, options.ports_dir.as_deref());
    let installer = SetupPyInstaller::new(python_exe);

    let mut builder = PortBuilder::new(descriptor, options, source_dir);
    if let Some(build_dir) = args.get_one::<PathBuf>("build_dir") {
        builder = builder.set_build_dir(build_dir);
    }

    let built = builder.build(&tree, &installer)?;

    for skipped in &built.translation.skipped {
        warn!("dependency not translated: {}", skipped);
    }
    for file in &built.files {
        println!("{}", built.build_dir.join(file).display());
    }

    Ok(())
}

fn command_translate_deps(args: &ArgMatches) -> Result<()> {
    let tree = ports_tree(args, None);

    let error_policy = if args.get_flag("skip_unsupported") {
        ErrorPolicy::Skip
    } else {
        ErrorPolicy::Abort
    };

    let translation = DependencyTranslator::new(TranslationPolicy::default(), &tree)
        .set_error_policy(error_policy)
        .translate(args.get_many::<String>("dep").into_iter().flatten())?;

    let mut w = MakefileWriter::new();
    w.line(translation.use_block())
        .variable("RUN_DEPENDS", translation.run_block());

    print!("{}", w.render());

    Ok(())
}

fn command_resolve_port(args: &ArgMatches) -> Result<()> {
    let tree = ports_tree(args, None);

    let name = args
        .get_one::<String>("name")
        .expect("name argument is required");
    let default_category = args
        .get_one::<String>("default_category")
        .expect("default_category argument has default value");

    let port = tree.resolve(name, default_category)?;

    println!("{} ${{PORTSDIR}}{}", port.canonical_name, port.relative_path);

    Ok(())
}

fn command_make_package(args: &ArgMatches) -> Result<()> {
    let build_dir = args
        .get_one::<PathBuf>("build_dir")
        .expect("build_dir argument is required");
    let dist_dir = args
        .get_one::<PathBuf>("dist_dir")
        .expect("dist_dir argument is required");

    if let Some(source_dir) = args.get_one::<PathBuf>("source_dir") {
        let python_exe = args
            .get_one::<PathBuf>("python")
            .expect("python argument has default value");

        info!("creating source distribution in {}", dist_dir.display());
        create_sdist(python_exe, source_dir, dist_dir)
            .map_err(|e| FptError::Python(format!("setup.py sdist failed: {:#}", e)))?;
    }

    make_package(build_dir, dist_dir)?;

    Ok(())
}
