use std::fs::File;
use std::io::{self, BufWriter, Cursor, IsTerminal, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Ability to push previously written bytes to stable storage.
pub trait Syncer {
    /// Sync buffered data.
    ///
    /// **Returns**
    /// - `Ok(())` once the data has been handed to the OS and synced.
    /// - `Err(..)` with the OS error otherwise. Streams that cannot be
    ///   synced at all (terminals, pipes) usually report `EINVAL`.
    fn sync(&mut self) -> io::Result<()>;
}

/// Byte destination accepted by [`SyncWriter`](crate::sync_writer::SyncWriter).
///
/// Beyond [`Write`], a sink may expose optional capabilities. All of them
/// default to "not supported", which is the normal case for in-memory
/// buffers and most adapters.
pub trait Sink: Write {
    /// The sync capability, if this sink has one.
    fn as_syncer(&mut self) -> Option<&mut dyn Syncer> {
        None
    }

    /// Whether this sink is a plain opened file (including the standard
    /// streams). Sync failures on such sinks may be platform quirks rather
    /// than real errors.
    fn is_file(&self) -> bool {
        false
    }

    /// Whether this sink is backed by an interactive terminal.
    fn is_terminal(&self) -> bool {
        false
    }
}

impl Syncer for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl Sink for File {
    fn as_syncer(&mut self) -> Option<&mut dyn Syncer> {
        Some(self)
    }

    fn is_file(&self) -> bool {
        true
    }

    fn is_terminal(&self) -> bool {
        IsTerminal::is_terminal(self)
    }
}

// The standard streams cannot be synced through std directly, so sync a
// duplicate of their descriptor.
#[cfg(unix)]
fn sync_fd(fd: std::os::fd::BorrowedFd<'_>) -> io::Result<()> {
    File::from(fd.try_clone_to_owned()?).sync_all()
}

#[cfg(unix)]
impl Syncer for io::Stdout {
    fn sync(&mut self) -> io::Result<()> {
        use std::os::fd::AsFd;

        self.flush()?;
        sync_fd(self.as_fd())
    }
}

#[cfg(unix)]
impl Syncer for io::Stderr {
    fn sync(&mut self) -> io::Result<()> {
        use std::os::fd::AsFd;

        self.flush()?;
        sync_fd(self.as_fd())
    }
}

impl Sink for io::Stdout {
    #[cfg(unix)]
    fn as_syncer(&mut self) -> Option<&mut dyn Syncer> {
        Some(self)
    }

    fn is_file(&self) -> bool {
        true
    }

    fn is_terminal(&self) -> bool {
        IsTerminal::is_terminal(self)
    }
}

impl Sink for io::Stderr {
    #[cfg(unix)]
    fn as_syncer(&mut self) -> Option<&mut dyn Syncer> {
        Some(self)
    }

    fn is_file(&self) -> bool {
        true
    }

    fn is_terminal(&self) -> bool {
        IsTerminal::is_terminal(self)
    }
}

impl Sink for Vec<u8> {}

impl Sink for Cursor<Vec<u8>> {}

impl Sink for io::Sink {}

impl<W: Sink> Syncer for BufWriter<W> {
    fn sync(&mut self) -> io::Result<()> {
        self.flush()?;
        match self.get_mut().as_syncer() {
            Some(inner) => inner.sync(),
            None => Ok(()),
        }
    }
}

impl<W: Sink> Sink for BufWriter<W> {
    fn as_syncer(&mut self) -> Option<&mut dyn Syncer> {
        Some(self)
    }

    fn is_file(&self) -> bool {
        self.get_ref().is_file()
    }

    fn is_terminal(&self) -> bool {
        self.get_ref().is_terminal()
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn as_syncer(&mut self) -> Option<&mut dyn Syncer> {
        (**self).as_syncer()
    }

    fn is_file(&self) -> bool {
        (**self).is_file()
    }

    fn is_terminal(&self) -> bool {
        (**self).is_terminal()
    }
}

/// Cloneable in-memory sink whose contents stay readable while a clone is
/// owned by a writer. Useful for capturing output in tests.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for SharedBuffer {}
