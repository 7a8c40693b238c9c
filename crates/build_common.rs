// README-to-rustdoc step shared by every crate's build.rs.
// Include with: include!("../build_common.rs");
// The including file imports std::env, std::fs and std::path::Path.

/// Copy the crate README into `OUT_DIR/README_GENERATED.md` with its source
/// links rewritten to module paths (`src/protocol/mod.rs` becomes `protocol`,
/// `src/text.rs` becomes `text`).
fn process_readme_for_rustdoc(crate_dir: &str) {
    println!("cargo:rerun-if-changed=README.md");

    let Ok(content) = fs::read_to_string(Path::new(crate_dir).join("README.md")) else {
        return;
    };

    let rustdoc_content = content
        .replace("](src/", "](")
        .replace("/mod.rs)", ")")
        .replace(".rs)", ")");

    let out_dir = env::var("OUT_DIR").expect("cargo sets OUT_DIR for build scripts");
    fs::write(Path::new(&out_dir).join("README_GENERATED.md"), rustdoc_content)
        .expect("OUT_DIR is writable");
}
