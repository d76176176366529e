//! Decode an ISO 2709 file and print it as MARCXML or tagged text
//!
//! ```text
//! cargo run --example decode_to_marcxml -- records.mrc
//! cargo run --example decode_to_marcxml -- --tagged records.mrc
//! cargo run --example decode_to_marcxml -- --xsd --pretty records.mrc
//! ```
//!
//! Without a path the records are read from standard input. The character
//! converter is picked per record from leader position 09, and diagnostics are
//! logged through `tracing` (set `RUST_LOG=warn` to see them).

use marcflow::{
    LoggingSink, MarcHandler, MarcReader, MarcXmlWriter, NormalizingHandler, TaggedWriter,
    MARCXML_SCHEMA_LOCATION,
};
use std::fs::File;
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut tagged = false;
    let mut xsd = false;
    let mut pretty = false;
    let mut path = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--tagged" => tagged = true,
            "--xsd" => xsd = true,
            "--pretty" => pretty = true,
            _ => path = Some(arg),
        }
    }

    let input: Box<dyn Read> = match path {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin().lock()),
    };
    let stdout = io::stdout().lock();

    if tagged {
        let mut writer = TaggedWriter::new(stdout);
        decode(input, &mut writer)?;
        writer.finish()?;
    } else {
        let mut xml = MarcXmlWriter::new(stdout).with_pretty_print(pretty);
        if xsd {
            xml = xml.with_schema_location(MARCXML_SCHEMA_LOCATION);
        }
        let mut writer = NormalizingHandler::new(xml);
        decode(input, &mut writer)?;
        writer.into_inner().finish()?;
    }
    Ok(())
}

fn decode<H: MarcHandler>(input: Box<dyn Read>, handler: &mut H) -> marcflow::Result<()> {
    let mut reader = MarcReader::new(input)
        .with_leader_encoding()
        .with_sink(LoggingSink);
    let summary = reader.parse(handler)?;
    eprintln!(
        "{} records decoded, {} skipped, {} warnings, {} errors",
        summary.records, summary.skipped, summary.warnings, summary.errors
    );
    Ok(())
}
