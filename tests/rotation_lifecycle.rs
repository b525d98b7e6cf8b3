//! End-to-end lifecycle tests: sinks driving rotation across process-like
//! open/close boundaries.

use memlog::{
    sink::RotatingFileSinkMt, MappedWriter, MemlogError, RetryPolicy, SizeRotatingWriter,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn generation(base: &PathBuf, index: usize) -> PathBuf {
    if index == 0 {
        base.clone()
    } else {
        PathBuf::from(format!("{}.{index}", base.display()))
    }
}

#[test]
fn rotated_history_survives_restart() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("service.log");

    // First "process": fill two generations.
    {
        let mut log = SizeRotatingWriter::new(&base, 16, 3).unwrap();
        log.append(b"gen-a ........\n").unwrap(); // 15 bytes
        log.append(b"gen-b ........\n").unwrap(); // forces rotation
        log.close().unwrap();
    }

    // Second "process": resumes generation 0 and rotates it away intact.
    {
        let mut log = SizeRotatingWriter::new(&base, 16, 3).unwrap();
        assert_eq!(log.current_size(), 15);
        log.append(b"gen-c ........\n").unwrap();
        log.close().unwrap();
    }

    assert_eq!(std::fs::read(generation(&base, 0)).unwrap(), b"gen-c ........\n");
    assert_eq!(std::fs::read(generation(&base, 1)).unwrap(), b"gen-b ........\n");
    assert_eq!(std::fs::read(generation(&base, 2)).unwrap(), b"gen-a ........\n");

    // Every closed generation holds exactly its logical bytes.
    for i in 0..=2 {
        assert_eq!(std::fs::metadata(generation(&base, i)).unwrap().len(), 15);
    }
}

#[test]
fn concurrent_sink_rotation_keeps_records_whole() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("busy.log");

    let record = b"0123456789ABCDEF\n"; // 17 bytes
    let per_thread = 50;
    let threads = 4;

    let writer = SizeRotatingWriter::new(&base, 17 * 10, 20).unwrap();
    let sink = Arc::new(RotatingFileSinkMt::new(writer));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let sink = sink.clone();
            std::thread::spawn(move || {
                for _ in 0..per_thread {
                    sink.on_record(record).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    sink.flush().unwrap();
    drop(sink);

    // All generations together hold every record, each one intact.
    let mut total = 0;
    for i in 0..=20 {
        let path = generation(&base, i);
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        assert_eq!(bytes.len() % record.len(), 0, "torn record in {path:?}");
        for chunk in bytes.chunks(record.len()) {
            assert_eq!(chunk, record);
        }
        total += bytes.len() / record.len();
    }
    assert_eq!(total, threads * per_thread);
}

#[test]
fn failed_open_leaves_writer_reusable() {
    let dir = TempDir::new().unwrap();
    let blocked = dir.path().join("blocked");
    std::fs::create_dir(&blocked).unwrap();

    let mut writer = MappedWriter::with_retry(RetryPolicy::none());
    assert!(matches!(
        writer.open(&blocked, 1024, false),
        Err(MemlogError::Open { .. })
    ));

    // Same writer, valid path: usable again.
    let path = dir.path().join("ok.log");
    writer.open(&path, 1024, false).unwrap();
    writer.append(b"recovered").unwrap();
    writer.close().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"recovered");
}
