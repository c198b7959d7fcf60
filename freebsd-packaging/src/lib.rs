// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! FreeBSD ports packaging for Python distributions.

This crate turns the metadata of a Python distribution into a FreeBSD port
directory: a `Makefile`, `pkg-descr`, `pkg-plist` and auxiliary files.

The main pieces are:

* [ports_tree::PortsTree], which locates ports in a ports collection.
* [dependency::DependencyTranslator], which turns Python requirement
  expressions into `USE_*` flags and `RUN_DEPENDS` entries.
* [plist::PlistSupplements], which extends the package list of a trial
  installation.
* [port_builder::PortBuilder], which ties everything together.
 */

pub mod dependency;
pub mod error;
pub mod makefile;
pub mod options;
pub mod plist;
pub mod port_builder;
pub mod ports_tree;
pub mod trial_install;
