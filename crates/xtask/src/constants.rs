pub const TARGET: &str = "thumbv7em-none-eabihf";
pub const CHIP: &str = "nRF52840_xxAA";
pub const APP_MANIFEST: &str = "crates/sampler-app/Cargo.toml";
pub const APP_NAME: &str = "sampler-app";

/// Path of the application ELF for the chosen profile.
pub fn app_elf(release: bool) -> String {
    let profile = if release { "release" } else { "debug" };
    format!("target/{TARGET}/{profile}/{APP_NAME}")
}
