use std::env;

fn main() {
    // pnet reads packets through Npcap on Windows; elsewhere there is nothing to link.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() != Ok("windows") {
        return;
    }

    // Change this path to your Npcap SDK installation folder if different
    let npcap_sdk_lib = env::var("NPCAP_SDK_LIB").unwrap_or_else(|_| r"C:\Npcap-SDK\Lib\x64".to_string());

    println!("cargo:rustc-link-search=native={}", npcap_sdk_lib);
    println!("cargo:rustc-link-lib=static=Packet");
    println!("cargo:rustc-link-lib=dylib=wpcap");

    println!("cargo:rerun-if-env-changed=NPCAP_SDK_LIB");
    println!("cargo:rerun-if-changed=build.rs");
}
