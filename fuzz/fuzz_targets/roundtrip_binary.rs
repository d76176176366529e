#![no_main]

use libfuzzer_sys::fuzz_target;
use marcflow::{MarcReader, MarcWriter};
use std::io::Cursor;

// Anything the decoder accepts must survive a write and a second decode.
fuzz_target!(|data: &[u8]| {
    let mut reader = MarcReader::new(Cursor::new(data)).with_leader_encoding();
    let Ok(Some(record)) = reader.read_record() else {
        return;
    };

    let mut writer = MarcWriter::new(Vec::new());
    if writer.write_record(&record).is_err() {
        // Fields can be too long to re-encode once converted to UTF-8.
        return;
    }
    let bytes = writer.into_inner().expect("writing to a Vec cannot fail");

    let mut reader = MarcReader::new(Cursor::new(bytes)).with_leader_encoding();
    let back = reader
        .read_record()
        .expect("re-encoded record decodes")
        .expect("re-encoded record is present");
    assert_eq!(back.control_fields(), record.control_fields());
    assert_eq!(back.data_fields(), record.data_fields());
});
