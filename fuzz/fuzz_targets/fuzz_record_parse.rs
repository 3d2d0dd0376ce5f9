#![no_main]

use libfuzzer_sys::fuzz_target;
use lj_record::{ColumnIndex, Delimiter, Record};

// First byte picks the delimiter, the rest is one line of input.
fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let delimiter = match selector % 4 {
        0 => " ",
        1 => ":",
        2 => "\t",
        _ => "::",
    };
    let Ok(delimiter) = Delimiter::new(delimiter) else {
        return;
    };

    let record = Record::parse(rest, &delimiter, 1);
    assert!(!record.is_empty());
    assert_eq!(record.fields().count(), record.len());
    assert_eq!(record.rejoin(delimiter.as_bytes(), None), record.raw());

    let column = ColumnIndex::new(usize::from(selector % 8) + 1).expect("non-zero");
    match record.key_at(column) {
        Ok(key) => assert_eq!(record.field(column.offset()), Some(key)),
        Err(missing) => assert!(missing.field_count < column.get()),
    }
});
