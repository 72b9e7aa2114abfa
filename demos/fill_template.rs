//! Fill Template Example
//!
//! This example maps a seller's product sheet onto a bulk-upload template,
//! prints a preview, and writes the filled template to a directory.
//!
//! Run without arguments to use generated sample workbooks:
//!
//! ```text
//! RUST_LOG=sheetmap=debug cargo run --example fill_template
//! cargo run --example fill_template -- plantilla.xlsx productos.xlsx --mode append --out salida
//! ```

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::PathBuf;
use std::process;

use rust_xlsxwriter::{Workbook, XlsxError};
use sheetmap::{
    DefaultSettings, DirectorySink, EngineBuilder, LogicalField, RemapChoices, SheetMapError,
    WriteMode, WriteRequest,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sheetmap=info")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut inputs = Vec::new();
    let mut mode = WriteMode::FillEmpty;
    let mut out_dir: Option<PathBuf> = None;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--mode" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: --mode requires a value");
                    process::exit(1);
                };
                mode = value.parse().unwrap_or_else(|e| {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                });
                i += 2;
            }
            "--out" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: --out requires a value");
                    process::exit(1);
                };
                out_dir = Some(PathBuf::from(value));
                i += 2;
            }
            other if other.starts_with("--") => {
                eprintln!("Error: Unknown option: {}", other);
                process::exit(1);
            }
            path => {
                inputs.push(path.to_string());
                i += 1;
            }
        }
    }

    if !inputs.is_empty() && inputs.len() != 2 {
        eprintln!(
            "Usage: {} [<template.xlsx> <products.xlsx>] [--mode <fill-empty|append|overwrite>] [--out <dir>]",
            args[0]
        );
        process::exit(1);
    }

    if let Err(e) = run(&inputs, mode, out_dir) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(inputs: &[String], mode: WriteMode, out_dir: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let (template_bytes, product_bytes) = match inputs {
        [template, products] => (read_file(template)?, read_file(products)?),
        _ => (sample_template()?, sample_products()?),
    };

    let engine = EngineBuilder::new().build()?;
    let template = engine.read_template(Cursor::new(template_bytes))?;
    let source = engine.read_source(Cursor::new(product_bytes))?;

    let mut session = engine.session(template.clone(), source.clone());
    for entry in &session.analysis().entries {
        println!(
            "{:<24} -> {:<12} ({:?})",
            entry.source_column,
            entry.logical_field.as_str(),
            entry.confidence()
        );
    }

    // 未分類の列は、見出しに「nota」を含む場合のみSKUとして割り当てる
    let unresolved = session.unresolved_headers().to_vec();
    if !unresolved.is_empty() {
        println!("Unresolved headers: {:?}", unresolved);
        let mut choices = RemapChoices::new();
        for header in &unresolved {
            let choice = header
                .to_lowercase()
                .contains("nota")
                .then_some(LogicalField::Sku);
            choices.insert(header.clone(), choice);
        }
        match session.apply_remap(&choices) {
            Ok(outcome) => println!("Remapped {} header(s)", outcome.entries.len()),
            Err(SheetMapError::AmbiguousRemap) => println!("Left unresolved headers unmapped"),
            Err(e) => return Err(e.into()),
        }
    }

    let defaults = DefaultSettings {
        condition: Some("new".to_string()),
        free_shipping: Some("yes".to_string()),
        ..Default::default()
    };
    session.set_defaults(defaults.clone());

    println!();
    session.render_preview(&mut io::stdout())?;
    println!();

    // セッションのマッピングをワイヤー形式の要求として書き込む
    let request = WriteRequest {
        ml_template: "plantilla.xlsx".to_string(),
        product_data: "productos.xlsx".to_string(),
        mapping: session.wire_mapping(),
        default_settings: defaults,
        write_mode: mode,
        edits: None,
    };

    let temp_dir;
    let dir = match out_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            dir
        }
        None => {
            temp_dir = tempfile::tempdir()?;
            temp_dir.path().to_path_buf()
        }
    };

    let response = engine.handle_write(&request, &template, &source, &DirectorySink::new(&dir))?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    println!("Stored in {}", dir.display());

    Ok(())
}

fn read_file(path: &str) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    File::open(path)?.read_to_end(&mut buffer)?;
    Ok(buffer)
}

fn sample_template() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Plantilla")?;
    worksheet.write_string(0, 0, "Publica tus productos")?;
    for (col, label) in ["Título", "Precio", "Stock", "Condición", "Forma de envío", "SKU"]
        .iter()
        .enumerate()
    {
        worksheet.write_string(6, col as u16, *label)?;
    }
    Ok(workbook.save_to_buffer()?)
}

fn sample_products() -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (col, header) in ["Nombre Producto", "Precio", "Stock Actual", "Notas internas"]
        .iter()
        .enumerate()
    {
        worksheet.write_string(0, col as u16, *header)?;
    }
    let rows = [("Zapato", "$ 100", 5.0, "Z-1"), ("Bota", "$ 1,250.50", 2.0, "B-1")];
    for (i, (name, price, stock, note)) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        worksheet.write_string(row, 0, *name)?;
        worksheet.write_string(row, 1, *price)?;
        worksheet.write_number(row, 2, *stock)?;
        worksheet.write_string(row, 3, *note)?;
    }
    Ok(workbook.save_to_buffer()?)
}
