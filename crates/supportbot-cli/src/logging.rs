//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after the configuration is loaded. Every
//! formatted line passes through [`sanitize_pii`] before it is written.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use supportbot_core::{Error, Result, sanitize_pii};

/// Initialise the global tracing subscriber.
///
/// `level` is an `EnvFilter` directive such as `"info"` or
/// `"supportbot_rag=debug,info"`; an invalid directive falls back to `info`.
/// With `log_file` set, lines are appended to that file without colours,
/// otherwise they go to stderr.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, ansi) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(PiiRedactingWriter::new(Mutex::new(file))), false)
        }
        None => (BoxMakeWriter::new(PiiRedactingWriter::new(io::stderr)), true),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .try_init()
        .map_err(|e| Error::Configuration(format!("failed to set subscriber: {e}")))?;

    Ok(())
}

/// `MakeWriter` wrapper that scrubs PII from each formatted event
#[derive(Debug, Clone)]
pub struct PiiRedactingWriter<M> {
    inner: M,
}

impl<M> PiiRedactingWriter<M> {
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<'a, M: MakeWriter<'a>> MakeWriter<'a> for PiiRedactingWriter<M> {
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new(self.inner.make_writer())
    }
}

/// Buffers one event and writes it scrubbed on flush or drop
pub struct RedactingWriter<W: Write> {
    inner: W,
    buffer: Vec<u8>,
}

impl<W: Write> RedactingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buffer: Vec::new(),
        }
    }

    fn write_buffered(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&self.buffer);
        let scrubbed = sanitize_pii(&text);
        self.buffer.clear();
        self.inner.write_all(scrubbed.as_bytes())
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.write_buffered()?;
        self.inner.flush()
    }
}

impl<W: Write> Drop for RedactingWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn writer_scrubs_on_drop() {
        let mut out = Vec::new();
        {
            let mut writer = RedactingWriter::new(&mut out);
            write!(writer, "order for jane.doe@example.com ").unwrap();
            writeln!(writer, "paid with 4111 1111 1111 1111").unwrap();
        }
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "order for [EMAIL-REDACTED] paid with [CC-REDACTED]\n"
        );
    }

    #[test]
    fn events_are_scrubbed() {
        let buf = SharedBuf::default();
        let sink = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(PiiRedactingWriter::new(move || sink.clone()))
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("call me at 555-123-4567");
        });

        let logged = buf.contents();
        assert!(logged.contains("call me at [PHONE-REDACTED]"), "{logged}");
    }
}
