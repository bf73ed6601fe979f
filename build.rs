use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=secrets.json");
    println!("cargo:rerun-if-changed=secrets.example.json");

    // Broker and Wi-Fi credentials are a build-time secret set. A local
    // `secrets.json` (git-ignored) wins; otherwise the example file is
    // embedded so host builds and CI still compile.
    let source = if PathBuf::from("secrets.json").exists() {
        "secrets.json"
    } else {
        println!("cargo:warning=secrets.json not found, embedding secrets.example.json");
        "secrets.example.json"
    };

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap());
    std::fs::copy(source, out_dir.join("secrets.json")).unwrap();

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
