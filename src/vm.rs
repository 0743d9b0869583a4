/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
//! The object model the snapshot code saves and loads.
pub mod array;
pub mod bytecode;
pub mod hash;
pub mod heap;
pub mod name_map;
pub mod opcodes;
pub mod process;
pub mod structure;
pub mod value;
