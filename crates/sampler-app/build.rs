//! Copies `memory.x` into the output directory so the linker finds it no
//! matter where the workspace is built from, and passes the link scripts.

use std::{env, fs::File, io::Write, path::PathBuf};

fn linker_data() -> &'static [u8] {
    include_bytes!("memory.x")
}

fn main() {
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
    File::create(out.join("memory.x"))
        .unwrap()
        .write_all(linker_data())
        .unwrap();
    println!("cargo:rustc-link-search={}", out.display());

    // Only re-run when the memory layout changes.
    println!("cargo:rerun-if-changed=memory.x");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    if env::var("CARGO_FEATURE_DEFMT").is_ok() {
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }

    let variant =
        if env::var("CARGO_FEATURE_READ_VARIANT").is_ok() { "read" } else { "notify" };
    println!("cargo:rustc-env=SAMPLER_VARIANT={variant}");
    println!("cargo:rustc-env=FW_VERSION={}", env!("CARGO_PKG_VERSION"));
}
