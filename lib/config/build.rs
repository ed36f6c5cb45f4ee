use serde::Deserialize;
use std::{collections::BTreeMap, env, fs, path::PathBuf};

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Number(u64),
    Text(String),
}

fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let flags_path = PathBuf::from(manifest_dir).join("../../flags.json");
    let flags_str = fs::read_to_string(&flags_path).unwrap();
    let flagmap: BTreeMap<String, FlagValue> = serde_json::from_str(&flags_str).unwrap();
    make_flags(&flagmap);
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../../flags.json");
}

fn make_flags(flagmap: &BTreeMap<String, FlagValue>) {
    let mut s = String::new();
    for (key, value) in flagmap {
        let line = match value {
            FlagValue::Number(value) => format!("pub const {}: usize = {};\n", key, value),
            FlagValue::Text(value) => format!("pub const {}: &str = {:?};\n", key, value),
        };
        s += line.as_str();
    }
    let out_dir = env::var("OUT_DIR").unwrap();
    let path = PathBuf::from(out_dir).join("build_flags.rs");
    fs::write(path, s).unwrap();
}
