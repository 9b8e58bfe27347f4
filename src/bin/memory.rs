use receivables_aggregator::{AggregationConfig, Aggregator, ReportWriter, list_input_files};
use std::{io, path::Path};

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _profiler = dhat::Profiler::new_heap();

    let dir = std::env::args().nth(1).unwrap_or_else(|| "files".to_string());
    let files = list_input_files(Path::new(&dir))?;

    let aggregator = Aggregator::new(AggregationConfig::default())?;
    let mut report = ReportWriter::new(io::sink(), b',');
    let summary = aggregator.run(&files, &mut report)?;
    report.finish()?;

    println!("{summary:?}");
    println!("Memory benchmark finished. See dhat-heap.json for details");
    Ok(())
}
