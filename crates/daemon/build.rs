// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::env;
use std::fs;
use std::io::Write;
use std::path::Path;

const NAMES: &[(&str, &str)] = &[
    (
        "CAREKEEP_STATE_DIR",
        "override the carekeep state directory",
    ),
    ("CAREKEEP_SNAPSHOT_DB", "override the snapshot database path"),
    ("XDG_STATE_HOME", "XDG base directory for state data"),
    (
        "RUST_LOG",
        "controls log level filtering (used by tracing-subscriber)",
    ),
];

fn main() {
    let out_dir = match env::var("OUT_DIR") {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("cargo:warning=OUT_DIR not set: {e}");
            std::process::exit(1);
        }
    };
    let dest_path = Path::new(&out_dir).join("env_names.rs");

    let mut contents = String::new();
    for (name, doc) in NAMES {
        contents.push_str(&format!(
            "/// Environment variable: {doc}.\npub const {name}: &str = \"{name}\";\n\n"
        ));
    }

    let written = fs::File::create(&dest_path).and_then(|mut f| f.write_all(contents.as_bytes()));
    if let Err(e) = written {
        eprintln!("cargo:warning=failed to write env_names.rs: {e}");
        std::process::exit(1);
    }
}
