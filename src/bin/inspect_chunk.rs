use anyhow::Result;
use std::collections::HashSet;
use std::fs::File;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        println!("Usage: {} <chunk_file>", args[0]);
        std::process::exit(1);
    }

    let file = File::open(&args[1])?;
    let mut reader = csv::Reader::from_reader(file);

    println!("\nColumns:");
    println!("{:#?}", reader.headers()?);

    let mut rows = 0usize;
    let mut devices = HashSet::new();
    let mut first_day: Option<String> = None;
    let mut last_day: Option<String> = None;

    for record in reader.records() {
        let record = record?;
        rows += 1;
        if let Some(id) = record.get(0) {
            if !id.is_empty() {
                devices.insert(id.to_string());
            }
        }
        if let Some(day) = record.get(4) {
            if first_day.as_deref().map_or(true, |d| day < d) {
                first_day = Some(day.to_string());
            }
            if last_day.as_deref().map_or(true, |d| day > d) {
                last_day = Some(day.to_string());
            }
        }
    }

    println!(
        "\n{} rows, {} devices, days {} to {}",
        rows,
        devices.len(),
        first_day.unwrap_or_default(),
        last_day.unwrap_or_default()
    );

    Ok(())
}
