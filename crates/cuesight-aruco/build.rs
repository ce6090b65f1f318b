use serde::Deserialize;
use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
struct CodeTable {
    name: String,
    marker_size: usize,
    max_correction_bits: u8,
    codes: Vec<u64>,
}

fn main() {
    let data_dir = Path::new(&env::var("CARGO_MANIFEST_DIR").expect("manifest dir")).join("data");
    println!("cargo:rerun-if-changed={}", data_dir.display());

    let mut paths: Vec<PathBuf> = fs::read_dir(&data_dir)
        .expect("read data dir")
        .map(|e| e.expect("dir entry").path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_CODES.json"))
        })
        .collect();
    paths.sort();

    let mut tables: Vec<CodeTable> = paths
        .iter()
        .map(|p| {
            println!("cargo:rerun-if-changed={}", p.display());
            let raw = fs::read_to_string(p).expect("read code table");
            let table: CodeTable = serde_json::from_str(&raw)
                .unwrap_or_else(|e| panic!("{}: {e}", p.display()));
            let bits = table.marker_size * table.marker_size;
            assert!(bits <= 64, "{}: {bits} bits", table.name);
            assert!(!table.codes.is_empty(), "{}: no codes", table.name);
            table
        })
        .collect();
    tables.sort_by_key(|t| (t.marker_size, t.codes.len()));

    let mut out = String::new();
    writeln!(out, "/// Names accepted by [`builtin_dictionary`].").unwrap();
    writeln!(out, "pub const BUILTIN_NAMES: [&str; {}] = [", tables.len()).unwrap();
    for t in &tables {
        writeln!(out, "    {:?},", t.name).unwrap();
    }
    writeln!(out, "];\n").unwrap();

    for t in &tables {
        writeln!(out, "static {}: [u64; {}] = [", t.name, t.codes.len()).unwrap();
        for chunk in t.codes.chunks(6) {
            let line: Vec<String> = chunk.iter().map(|c| format!("0x{c:016x}")).collect();
            writeln!(out, "    {},", line.join(", ")).unwrap();
        }
        writeln!(out, "];\n").unwrap();
    }

    writeln!(out, "/// Look up a built-in dictionary by name, e.g. `\"DICT_5X5_50\"`.").unwrap();
    writeln!(out, "pub fn builtin_dictionary(name: &str) -> Option<Dictionary> {{").unwrap();
    writeln!(out, "    let (marker_size, max_correction_bits, codes): (usize, u8, &'static [u64]) = match name {{").unwrap();
    for t in &tables {
        writeln!(
            out,
            "        {:?} => ({}, {}, &{}),",
            t.name, t.marker_size, t.max_correction_bits, t.name
        )
        .unwrap();
    }
    writeln!(out, "        _ => return None,").unwrap();
    writeln!(out, "    }};").unwrap();
    writeln!(out, "    let name = BUILTIN_NAMES.iter().copied().find(|n| *n == name)?;").unwrap();
    writeln!(out, "    Some(Dictionary {{").unwrap();
    writeln!(out, "        name: Cow::Borrowed(name),").unwrap();
    writeln!(out, "        marker_size,").unwrap();
    writeln!(out, "        max_correction_bits,").unwrap();
    writeln!(out, "        codes: Cow::Borrowed(codes),").unwrap();
    writeln!(out, "    }})").unwrap();
    writeln!(out, "}}").unwrap();

    let dest = Path::new(&env::var("OUT_DIR").expect("out dir")).join("builtins.rs");
    fs::write(dest, out).expect("write builtins.rs");
}
