use clap::Parser;
use rand::Rng;
use receivables_aggregator::processor::schema::{Column, Schema};
use std::{
    error::Error,
    fs::{self, File},
    io::{BufWriter, Write},
    path::PathBuf,
};

const CREDITORS: [&str; 4] = ["ACME FOMENTO", "BANCO ALFA", "CREDITA SA", "FUNDO BETA"];
const DEBTORS: [&str; 5] = [
    "JOAO SILVA",
    "MARIA SOUZA",
    "COMERCIAL JOAO LTDA",
    "PADARIA CENTRAL",
    "ANA LIMA",
];

/// Writes synthetic receivables stock files with the 54-column layout.
#[derive(Parser, Debug)]
struct Args {
    /// Directory the files are written to
    #[arg(long, default_value = "files")]
    out_dir: PathBuf,

    #[arg(long, default_value_t = 4)]
    files: usize,

    #[arg(long, default_value_t = 250_000)]
    rows_per_file: usize,

    /// Distinct document numbers spread over all files
    #[arg(long, default_value_t = 100_000)]
    documents: u32,

    /// Write `1.234,56` instead of `1,234.56`
    #[arg(long)]
    brazilian_numbers: bool,
}

fn money(cents: u64, brazilian: bool) -> String {
    let (group, decimal) = if brazilian { ('.', ',') } else { (',', '.') };
    let units = (cents / 100).to_string();
    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, c) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(group);
        }
        grouped.push(c);
    }
    format!("{grouped}{decimal}{:02}", cents % 100)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let schema = Schema::default();
    fs::create_dir_all(&args.out_dir)?;

    let header: Vec<String> = (0..schema.column_count)
        .map(|i| {
            Column::ALL
                .iter()
                .find(|&&c| schema.index(c) == i)
                .map_or_else(|| format!("COL_{i:02}"), |c| c.name().to_string())
        })
        .collect();

    let mut rng = rand::rng();
    let mut row = vec![String::new(); schema.column_count];

    for n in 0..args.files {
        let path = args.out_dir.join(format!("stock_{n:03}.csv"));
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{}", header.join(";"))?;

        for line in 0..args.rows_per_file {
            for (i, cell) in row.iter_mut().enumerate() {
                cell.clear();
                cell.push_str(&format!("X{}", (line + i) % 97));
            }
            let creditor = rng.random_range(0..CREDITORS.len());
            let nominal = rng.random_range(100..10_000_000u64);
            let present = nominal * rng.random_range(80..100u64) / 100;
            let acquisition = present * rng.random_range(85..100u64) / 100;

            row[schema.document_id] = format!("{:010}", rng.random_range(1..=args.documents));
            row[schema.creditor_name] = CREDITORS[creditor].to_string();
            row[schema.creditor_id] = format!("{:014}", creditor + 1);
            let debtor = rng.random_range(0..DEBTORS.len());
            row[schema.debtor_name] = DEBTORS[debtor].to_string();
            row[schema.debtor_id] = format!("{:011}", debtor + 1);
            row[schema.nominal_value] = money(nominal, args.brazilian_numbers);
            row[schema.present_value] = money(present, args.brazilian_numbers);
            row[schema.acquisition_value] = money(acquisition, args.brazilian_numbers);

            writeln!(writer, "{}", row.join(";"))?;
        }
        writer.flush()?;
        println!("Sample CSV generated: {}", path.display());
    }

    Ok(())
}
