#![no_main]

use libfuzzer_sys::fuzz_target;
use marcflow::{CollectingSink, Marc8Converter, MarcReader, RecordCollector};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let mut reader = MarcReader::new(Cursor::new(data))
        .with_converter(Box::new(Marc8Converter::new()))
        .with_sink(CollectingSink::new());
    let mut collector = RecordCollector::new();
    // Only the default policy is used, so nothing is fatal.
    reader.parse(&mut collector).expect("recoverable input never fails");
});
