use crate::sink::Sink;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing_subscriber::fmt::MakeWriter;

struct Inner<W> {
    sink: W,
    diagnostics: Box<dyn Write + Send>,
}

/// Concurrency safe wrapper around a [`Sink`].
///
/// Every call takes the same lock, so each `write` reaches the sink as one
/// contiguous run of bytes and `sync` never overlaps a write. Share it
/// between producers with an `Arc`.
pub struct SyncWriter<W> {
    inner: Mutex<Inner<W>>,
}

impl<W: Sink> SyncWriter<W> {
    /// Wrap `sink`. Sync failures are reported on the process stderr.
    pub fn new(sink: W) -> Self {
        Self::with_diagnostics(sink, Box::new(io::stderr()))
    }

    /// Wrap `sink`, reporting unexpected sync failures and anything passed
    /// to [`SyncWriter::report`] to `diagnostics`.
    ///
    /// Nothing reported there goes through `sink`.
    pub fn with_diagnostics(sink: W, diagnostics: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Mutex::new(Inner { sink, diagnostics }),
        }
    }

    fn lock(&self) -> io::Result<MutexGuard<'_, Inner<W>>> {
        self.inner
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }

    /// Forward `buf` to the sink's `write` under the lock and return its
    /// result unchanged.
    pub fn write(&self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.sink.write(buf)
    }

    /// Write all of `buf` under a single lock acquisition, so the bytes stay
    /// contiguous even if the sink performs short writes.
    pub fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        self.lock()?.sink.write_all(buf)
    }

    /// Flush the sink's userspace buffers.
    pub fn flush(&self) -> io::Result<()> {
        self.lock()?.sink.flush()
    }

    /// Best-effort sync of the sink to stable storage.
    ///
    /// Sinks without the capability are left alone. On plain files the
    /// errors streams give when they do not support syncing (EINVAL,
    /// ENOTTY, EBADF, as stdout and stderr do) are ignored. Anything else
    /// is reported on the diagnostics handle tagged with `sink_name`.
    /// Never fails.
    pub fn sync(&self, sink_name: &str) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let Inner { sink, diagnostics } = &mut *guard;

        let is_file = sink.is_file();
        let Some(syncer) = sink.as_syncer() else {
            return;
        };
        let err = match syncer.sync() {
            Ok(()) => return,
            Err(err) => err,
        };
        if is_file && is_unsupported_sync(&err) {
            return;
        }

        let _ = writeln!(diagnostics, "failed to sync {}: {}", sink_name, err);
        let _ = diagnostics.flush();
    }

    /// Write one line to the diagnostics handle, bypassing the sink.
    /// Never fails.
    pub fn report(&self, message: fmt::Arguments<'_>) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(guard.diagnostics, "{}", message);
        let _ = guard.diagnostics.flush();
    }

    /// Unwrap the sink, handing it back to its owner.
    pub fn into_inner(self) -> W {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .sink
    }
}

#[cfg(unix)]
fn is_unsupported_sync(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EINVAL | libc::ENOTTY | libc::EBADF)
    )
}

#[cfg(not(unix))]
fn is_unsupported_sync(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::InvalidInput
}

impl<W: Sink> Write for &SyncWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        SyncWriter::write(*self, buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        SyncWriter::write_all(*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        SyncWriter::flush(*self)
    }
}

impl<'a, W: Sink + 'a> MakeWriter<'a> for SyncWriter<W> {
    type Writer = &'a SyncWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{SharedBuffer, Syncer};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Sink whose sync always fails with the configured error.
    struct FailingSync {
        file: bool,
        err: fn() -> io::Error,
        calls: Arc<AtomicUsize>,
    }

    impl Write for FailingSync {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Syncer for FailingSync {
        fn sync(&mut self) -> io::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.err)())
        }
    }

    impl Sink for FailingSync {
        fn as_syncer(&mut self) -> Option<&mut dyn Syncer> {
            Some(self)
        }

        fn is_file(&self) -> bool {
            self.file
        }
    }

    fn failing(
        file: bool,
        err: fn() -> io::Error,
    ) -> (SyncWriter<FailingSync>, SharedBuffer, Arc<AtomicUsize>) {
        let diag = SharedBuffer::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = FailingSync {
            file,
            err,
            calls: Arc::clone(&calls),
        };
        (
            SyncWriter::with_diagnostics(sink, Box::new(diag.clone())),
            diag,
            calls,
        )
    }

    #[test]
    fn write_forwards_to_sink() {
        let writer = SyncWriter::new(Vec::new());
        assert_eq!(writer.write(b"abc").unwrap(), 3);
        writer.write_all(b"def").unwrap();
        assert_eq!(writer.into_inner(), b"abcdef");
    }

    #[test]
    fn report_goes_to_diagnostics_only() {
        let diag = SharedBuffer::new();
        let writer = SyncWriter::with_diagnostics(Vec::new(), Box::new(diag.clone()));
        writer.report(format_args!("sink {} is gone", "app.log"));
        assert_eq!(diag.to_string_lossy(), "sink app.log is gone\n");
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn write_errors_are_returned() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        impl Sink for Broken {}

        let err = SyncWriter::new(Broken).write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn sync_without_capability_is_noop() {
        let diag = SharedBuffer::new();
        let writer = SyncWriter::with_diagnostics(Vec::new(), Box::new(diag.clone()));
        writer.write_all(b"data").unwrap();
        writer.sync("memory");
        assert!(diag.contents().is_empty());
        assert_eq!(writer.into_inner(), b"data");
    }

    #[cfg(unix)]
    #[test]
    fn unsupported_sync_on_file_is_swallowed() {
        let quirks: [fn() -> io::Error; 3] = [
            || io::Error::from_raw_os_error(libc::EINVAL),
            || io::Error::from_raw_os_error(libc::ENOTTY),
            || io::Error::from_raw_os_error(libc::EBADF),
        ];
        for err in quirks {
            let (writer, diag, calls) = failing(true, err);
            writer.sync("stdout");
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(diag.contents().is_empty(), "{}", diag.to_string_lossy());
        }
    }

    #[cfg(unix)]
    #[test]
    fn unsupported_code_on_non_file_is_reported() {
        let (writer, diag, _) = failing(false, || io::Error::from_raw_os_error(libc::EINVAL));
        writer.sync("pipe");
        assert!(diag.to_string_lossy().starts_with("failed to sync pipe: "));
    }

    #[test]
    fn other_sync_failures_go_to_diagnostics() {
        let (writer, diag, calls) = failing(true, || io::Error::new(io::ErrorKind::Other, "disk full"));
        writer.write_all(b"line\n").unwrap();
        writer.sync("app.log");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(diag.to_string_lossy(), "failed to sync app.log: disk full\n");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn syncing_dev_null_is_quiet() {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .open("/dev/null")
            .unwrap();
        let diag = SharedBuffer::new();
        let writer = SyncWriter::with_diagnostics(file, Box::new(diag.clone()));
        writer.write_all(b"discarded").unwrap();
        writer.sync("null");
        assert!(diag.contents().is_empty(), "{}", diag.to_string_lossy());
    }

    #[test]
    fn syncing_regular_file_succeeds_quietly() {
        let diag = SharedBuffer::new();
        let writer = SyncWriter::with_diagnostics(tempfile::tempfile().unwrap(), Box::new(diag.clone()));
        writer.write_all(b"persist me").unwrap();
        writer.sync("tmp");
        assert!(diag.contents().is_empty());
    }

    #[test]
    fn sync_survives_poisoned_lock() {
        let (writer, diag, calls) = failing(true, || io::Error::new(io::ErrorKind::Other, "eio"));
        let writer = Arc::new(writer);
        let poisoner = Arc::clone(&writer);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(writer.write(b"x").is_err());
        writer.sync("poisoned");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(diag.to_string_lossy().contains("eio"));
    }

    #[test]
    fn usable_as_io_write_and_make_writer() {
        let writer = SyncWriter::new(Vec::new());
        let mut w = &writer;
        write!(w, "{}-{}", 1, 2).unwrap();
        let mut made = writer.make_writer();
        made.write_all(b"!").unwrap();
        assert_eq!(writer.into_inner(), b"1-2!");
    }
}
