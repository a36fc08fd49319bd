//! SPARQL to Circom compiler - CLI
//!
//! Reads a SELECT query (inline or from a .rq file) and writes the generated
//! circuit and witness manifest to an output directory.

use std::fs;
use std::path::Path;

use clap::{Arg, Command};

use sparql_circom::{CompileOptions, compile_query};

fn write_file(path: &str, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let matches = Command::new("sparql-circom")
        .version("0.1")
        .about("Generates Circom ZK circuits from SPARQL SELECT queries")
        .arg(
            Arg::new("query")
                .short('q')
                .long("query")
                .value_name("QUERY")
                .help("SPARQL query string or path to .rq file")
                .num_args(1),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for query.circom and manifest.json")
                .num_args(1)
                .default_value("circuits"),
        )
        .arg(
            Arg::new("width")
                .short('w')
                .long("width")
                .value_name("W")
                .help("Encoded term width in slots")
                .num_args(1),
        )
        .arg(
            Arg::new("comparator-bits")
                .long("comparator-bits")
                .value_name("N")
                .help("Bit width of the circomlib comparison gates")
                .num_args(1),
        )
        .get_matches();

    // Read query - require explicit query specification
    let query_text = if let Some(q) = matches.get_one::<String>("query") {
        let path = Path::new(q);
        if path.exists() {
            fs::read_to_string(path)?
        } else {
            q.clone()
        }
    } else {
        return Err("No query specified. Use -q <query> or -q <path/to/query.rq>".into());
    };

    let mut options = CompileOptions::default();
    if let Some(width) = matches.get_one::<String>("width") {
        options.term_width = width.parse()?;
    }
    if let Some(bits) = matches.get_one::<String>("comparator-bits") {
        options.comparator_bits = bits.parse()?;
    }

    let artifacts = compile_query(&query_text, &options)?;

    let out_dir = matches
        .get_one::<String>("output")
        .map(String::as_str)
        .unwrap_or("circuits");
    let circuit_out = format!("{out_dir}/query.circom");
    let manifest_out = format!("{out_dir}/manifest.json");

    write_file(&circuit_out, &artifacts.circuit)?;
    write_file(
        &manifest_out,
        &serde_json::to_string_pretty(&artifacts.manifest)?,
    )?;

    println!("Generated: {circuit_out}, {manifest_out}");

    Ok(())
}
