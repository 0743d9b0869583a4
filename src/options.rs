/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */
use std::path::PathBuf;

use structopt::StructOpt;

#[derive(StructOpt, Debug, Clone)]
#[structopt(name = "vmsnap", about = "Inspect and rewrite script object files")]
pub struct Options {
    #[structopt(parse(from_os_str), help = "Input object file")]
    pub file: PathBuf,
    #[structopt(
        short = "o",
        long = "output",
        parse(from_os_str),
        help = "Save the loaded program to a new object file"
    )]
    pub output: Option<PathBuf>,
    #[structopt(long = "strip-debug", help = "Omit file names and line numbers")]
    pub strip_debug: bool,
    #[structopt(long = "records", help = "Dump record structure instead of disassembly")]
    pub records: bool,
    #[structopt(long = "log-save", help = "Log every object as it is planned and written")]
    pub log_save: bool,
    #[structopt(long = "log-load", help = "Log every record as it is loaded")]
    pub log_load: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            file: PathBuf::new(),
            output: None,
            strip_debug: false,
            records: false,
            log_save: false,
            log_load: false,
        }
    }
}

impl Options {
    pub fn with_strip_debug(mut self, enable: bool) -> Self {
        self.strip_debug = enable;
        self
    }

    pub fn with_log_save(mut self, enable: bool) -> Self {
        self.log_save = enable;
        self
    }

    pub fn with_log_load(mut self, enable: bool) -> Self {
        self.log_load = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flags() {
        let options =
            Options::from_iter(vec!["vmsnap", "--strip-debug", "-o", "out.obj", "in.obj"]);
        assert_eq!(options.file, PathBuf::from("in.obj"));
        assert_eq!(options.output, Some(PathBuf::from("out.obj")));
        assert!(options.strip_debug);
        assert!(!options.records && !options.log_load && !options.log_save);
    }
}
