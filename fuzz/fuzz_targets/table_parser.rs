#![no_main]
use libfuzzer_sys::fuzz_target;
use tripmatch_core::{decode_table, TableSource};
use tripmatch_model::{ShapePoint, Stop, StopTime, Trip};

fuzz_target!(|data: &[u8]| {
    let utf8 = TableSource::new("fuzz.csv", "utf-8", false);
    let shift_jis = TableSource::new("fuzz.csv", "shift_jis", true);

    let _ = decode_table::<ShapePoint>(data, &utf8);
    let _ = decode_table::<Trip>(data, &shift_jis);
    let _ = decode_table::<Stop>(data, &shift_jis);
    if let Ok(table) = decode_table::<StopTime>(data, &shift_jis) {
        for row in &table.rows {
            let _ = row.departure();
        }
    }
});
