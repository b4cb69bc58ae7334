use chrono::{Local, TimeZone, Utc};
use tracing_human_sink::{format_entry, Entry, Level, SpanContext, SpanId, SyncWriter, TraceId};

// Jan 02 15:04:05 on the local clock, as the formatter renders it.
fn jan_2() -> chrono::DateTime<Utc> {
    Local
        .with_ymd_and_hms(2024, 1, 2, 15, 4, 5)
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn error_entry_with_one_field() {
    let entry = Entry::new(Level::Error, "boom")
        .with_time(jan_2())
        .with_location("server.go", 42)
        .with_field("retries", 3);

    let out = format_entry(&entry, false);
    let (head, block) = out.split_once('\n').unwrap();
    assert!(head.starts_with("[ERROR] {server.go:42} Jan 02 "), "{}", head);
    assert!(head.ends_with(": boom"));
    assert_eq!(block, "retries: 3");
}

#[test]
fn formatted_entries_written_through_sync_writer() {
    let writer = SyncWriter::new(Vec::new());
    let entry = Entry::new(Level::Warn, "disk almost full")
        .with_time(jan_2())
        .with_location("/srv/app/src/store.rs", 7)
        .with_component("store")
        .with_span_context(SpanContext::new(TraceId(1), SpanId(2)))
        .with_field("free_mb", 12);

    for _ in 0..2 {
        writer.write_all(format_entry(&entry, false).as_bytes()).unwrap();
        writer.write_all(b"\n").unwrap();
    }

    let out = String::from_utf8(writer.into_inner()).unwrap();
    let record = format!(
        "[WARN] {{store.rs:7}} (store) Jan 02 15:04:05.000: \"disk almost full\"\ntrace: {:032x}\nspan: {:016x}\nfree_mb: 12\n",
        1, 2
    );
    assert_eq!(out, record.repeat(2));
}
