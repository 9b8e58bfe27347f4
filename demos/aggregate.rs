use receivables_aggregator::{
    AggregationConfig, Aggregator, FilterSet, ReportWriter, Schema, TextMatch, list_input_files,
};
use std::fs;

fn line(schema: &Schema, id: &str, debtor: &str, values: [&str; 3]) -> String {
    let mut cols = vec![String::new(); schema.column_count];
    cols[schema.document_id] = id.to_string();
    cols[schema.creditor_name] = "ACME FOMENTO".to_string();
    cols[schema.debtor_name] = debtor.to_string();
    cols[schema.nominal_value] = values[0].to_string();
    cols[schema.present_value] = values[1].to_string();
    cols[schema.acquisition_value] = values[2].to_string();
    cols.join(";")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let schema = Schema::default();
    let dir = tempfile::tempdir()?;
    let header = vec!["H"; schema.column_count].join(";");

    fs::write(
        dir.path().join("jan.csv"),
        [
            header.clone(),
            line(&schema, "0000000001", "JOAO SILVA", ["10.00", "9.00", "8.00"]),
            line(&schema, "0000000002", "MARIA SOUZA", ["1,200.50", "1,100.00", "1,000.00"]),
        ]
        .join("\n"),
    )?;
    fs::write(
        dir.path().join("feb.csv"),
        [
            header,
            line(&schema, "0000000001", "JOAO SILVA", ["20.00", "19.00", "18.00"]),
            line(&schema, "0000000003", "COMERCIAL JOAO LTDA", ["5", "4.5", "4"]),
        ]
        .join("\n"),
    )?;

    let files = list_input_files(dir.path())?;

    // Every document, two aggregates in memory at most.
    let aggregator = Aggregator::new(AggregationConfig {
        ceiling: 2,
        ..Default::default()
    })?;
    let mut report = ReportWriter::new(Vec::new(), b',');
    let summary = aggregator.run(&files, &mut report)?;
    println!("{}", String::from_utf8(report.finish()?)?);
    println!("{summary:?}");

    // Only debtors whose name contains "joao".
    let config = AggregationConfig {
        filters: FilterSet::new().debtor_name("joao", TextMatch::Contains),
        ..Default::default()
    };
    println!("report file would be {}", config.report_path("output".as_ref()).display());
    let mut report = ReportWriter::new(Vec::new(), b',');
    Aggregator::new(config)?.run(&files, &mut report)?;
    println!("{}", String::from_utf8(report.finish()?)?);

    Ok(())
}
