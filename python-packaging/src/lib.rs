// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Python Packaging Primitives

This crate exposes the Python side of converting a Python distribution into
an operating system package: reading distribution metadata (`PKG-INFO`),
parsing requirement strings into version predicates and asking an
interpreter where it installs things.
*/

pub mod interpreter;
pub mod package_metadata;
pub mod version_predicate;
