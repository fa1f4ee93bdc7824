//! Waveform trace output.
//!
//! The [`TraceSink`] trait abstracts trace output. [`VcdTraceSink`] writes
//! IEEE 1364 Value Change Dump files (optionally gzip-compressed) that can be
//! viewed in GTKWave, Surfer, or other waveform viewers. [`NullTraceSink`]
//! is used when tracing is disabled for a run.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clockstep_config::ConfigError;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::TraceError;
use crate::time::VirtualTime;
use crate::value::{PortDecl, Snapshot};

/// Receives one snapshot per clock phase.
///
/// Timestamps passed to [`capture`](Self::capture) must be strictly
/// increasing; sinks reject anything else.
pub trait TraceSink {
    /// Prepares the output, declaring every port that will be captured.
    fn open(&mut self, name: &str, ports: &[PortDecl]) -> Result<(), TraceError>;

    /// Records the state of every port at `time`.
    fn capture(&mut self, time: VirtualTime, snapshot: &Snapshot<'_>) -> Result<(), TraceError>;

    /// Flushes and finishes the output. After this the trace is complete.
    fn close(&mut self) -> Result<(), TraceError>;

    /// Discards a trace that cannot be completed.
    fn abandon(&mut self) {}

    /// Where the trace is written, if anywhere.
    fn location(&self) -> Option<&Path> {
        None
    }
}

impl<T: TraceSink + ?Sized> TraceSink for Box<T> {
    fn open(&mut self, name: &str, ports: &[PortDecl]) -> Result<(), TraceError> {
        (**self).open(name, ports)
    }

    fn capture(&mut self, time: VirtualTime, snapshot: &Snapshot<'_>) -> Result<(), TraceError> {
        (**self).capture(time, snapshot)
    }

    fn close(&mut self) -> Result<(), TraceError> {
        (**self).close()
    }

    fn abandon(&mut self) {
        (**self).abandon()
    }

    fn location(&self) -> Option<&Path> {
        (**self).location()
    }
}

/// Checks that a trace can be created at `path` without creating it.
///
/// Writability is tested by creating and removing a scratch file next to
/// `path`, so permission and ownership rules are honoured as they will be
/// when the trace is opened.
pub fn check_trace_location(path: &Path) -> Result<(), ConfigError> {
    let reject = |reason: &str| ConfigError::TraceLocation {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };
    if path.as_os_str().is_empty() {
        return Err(reject("path is empty"));
    }
    if path.is_dir() {
        return Err(reject("path is a directory"));
    }
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(reject("parent directory does not exist"));
    }
    // The scratch file is removed when dropped.
    tempfile::Builder::new()
        .prefix(".clockstep-")
        .tempfile_in(parent)
        .map(drop)
        .map_err(|e| reject(&format!("parent directory is not writable: {e}")))
}

/// Rejects a timestamp that is not strictly after the previous one.
fn check_order(previous: Option<VirtualTime>, got: VirtualTime) -> Result<(), TraceError> {
    match previous {
        Some(previous) if got <= previous => Err(TraceError::NonMonotonic { previous, got }),
        _ => Ok(()),
    }
}

/// Change-only VCD text encoder over any writer.
///
/// Signal identifiers use printable ASCII characters starting from `!` (0x21).
pub struct VcdWriter<W: Write> {
    writer: W,
    widths: Vec<u32>,
    last: Vec<Option<u64>>,
    dumped: bool,
}

impl<W: Write> VcdWriter<W> {
    /// Writes the header and variable declarations for `ports` under scope `name`.
    pub fn new(
        mut writer: W,
        name: &str,
        timescale: &str,
        ports: &[PortDecl],
    ) -> Result<Self, TraceError> {
        writeln!(writer, "$date")?;
        writeln!(writer, "  Simulation date")?;
        writeln!(writer, "$end")?;
        writeln!(writer, "$version")?;
        writeln!(writer, "  clockstep cycle driver")?;
        writeln!(writer, "$end")?;
        writeln!(writer, "$timescale")?;
        writeln!(writer, "  {timescale}")?;
        writeln!(writer, "$end")?;
        writeln!(writer, "$scope module {} $end", scope_name(name))?;
        for (index, port) in ports.iter().enumerate() {
            let id_code = Self::make_id_code(index as u32);
            writeln!(writer, "$var wire {} {id_code} {} $end", port.width, port.name)?;
        }
        writeln!(writer, "$upscope $end")?;
        writeln!(writer, "$enddefinitions $end")?;

        Ok(Self {
            writer,
            widths: ports.iter().map(|p| p.width).collect(),
            last: vec![None; ports.len()],
            dumped: false,
        })
    }

    /// Generates a VCD identifier code from a sequential index.
    ///
    /// Multi-character codes are generated for indices >= 94.
    fn make_id_code(index: u32) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            let c = (b'!' + (idx % 94) as u8) as char;
            result.push(c);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    /// Formats a value as a VCD scalar or binary vector.
    fn format_value(value: u64, width: u32) -> String {
        if width == 1 {
            let bit = if (value & 1) == 1 { "1" } else { "0" };
            bit.to_string()
        } else {
            let mut s = String::with_capacity(width as usize + 1);
            s.push('b');
            for i in (0..width).rev() {
                let bit = if i < 64 { (value >> i) & 1 } else { 0 };
                s.push(if bit == 1 { '1' } else { '0' });
            }
            s
        }
    }

    fn write_value(&mut self, index: usize, value: u64) -> io::Result<()> {
        let width = self.widths[index];
        let id_code = Self::make_id_code(index as u32);
        let val_str = Self::format_value(value, width);
        if width == 1 {
            writeln!(self.writer, "{val_str}{id_code}")
        } else {
            writeln!(self.writer, "{val_str} {id_code}")
        }
    }

    /// Records `values` (one per declared port) at `time`.
    ///
    /// The first call dumps every value inside `$dumpvars`; later calls only
    /// write ports whose value changed, and skip the timestamp entirely when
    /// nothing did.
    pub fn record(&mut self, time: u64, values: &[u64]) -> Result<(), TraceError> {
        if !self.dumped {
            writeln!(self.writer, "#{time}")?;
            writeln!(self.writer, "$dumpvars")?;
            for (index, &value) in values.iter().enumerate().take(self.widths.len()) {
                self.write_value(index, value)?;
                self.last[index] = Some(value);
            }
            writeln!(self.writer, "$end")?;
            self.dumped = true;
            return Ok(());
        }

        let mut stamped = false;
        for (index, &value) in values.iter().enumerate().take(self.widths.len()) {
            if self.last[index] == Some(value) {
                continue;
            }
            if !stamped {
                writeln!(self.writer, "#{time}")?;
                stamped = true;
            }
            self.write_value(index, value)?;
            self.last[index] = Some(value);
        }
        Ok(())
    }

    /// Writes the final timestamp, flushes, and returns the writer.
    pub fn finish(mut self, end_time: Option<u64>) -> Result<W, TraceError> {
        if let Some(t) = end_time {
            writeln!(self.writer, "#{t}")?;
        }
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// VCD scope names may not contain whitespace.
fn scope_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "top".to_string()
    } else {
        cleaned
    }
}

/// File output, either plain or gzip-compressed.
enum TraceFile {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl TraceFile {
    /// Completes the gzip stream, if any, and flushes to disk.
    fn finish(self) -> io::Result<()> {
        match self {
            TraceFile::Plain(mut w) => w.flush(),
            TraceFile::Gzip(gz) => gz.finish()?.flush(),
        }
    }
}

impl Write for TraceFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TraceFile::Plain(w) => w.write(buf),
            TraceFile::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TraceFile::Plain(w) => w.flush(),
            TraceFile::Gzip(w) => w.flush(),
        }
    }
}

/// Writes a VCD file at a fixed path.
///
/// The file is created by [`open`](TraceSink::open) and removed again by
/// [`abandon`](TraceSink::abandon), so a failed run never leaves a partial
/// trace that looks complete.
pub struct VcdTraceSink {
    path: PathBuf,
    timescale: String,
    compress: bool,
    writer: Option<VcdWriter<TraceFile>>,
    values: Vec<u64>,
    last_time: Option<VirtualTime>,
}

impl VcdTraceSink {
    /// Creates a sink for `path` with the given `$timescale`.
    pub fn new(path: impl Into<PathBuf>, timescale: impl Into<String>, compress: bool) -> Self {
        Self {
            path: path.into(),
            timescale: timescale.into(),
            compress,
            writer: None,
            values: Vec::new(),
            last_time: None,
        }
    }
}

impl TraceSink for VcdTraceSink {
    fn open(&mut self, name: &str, ports: &[PortDecl]) -> Result<(), TraceError> {
        let file = File::create(&self.path).map_err(|source| TraceError::Open {
            path: self.path.clone(),
            source,
        })?;
        let buffered = BufWriter::new(file);
        let output = if self.compress {
            TraceFile::Gzip(GzEncoder::new(buffered, Compression::default()))
        } else {
            TraceFile::Plain(buffered)
        };
        self.writer = Some(VcdWriter::new(output, name, &self.timescale, ports)?);
        self.values = vec![0; ports.len()];
        self.last_time = None;
        tracing::debug!(path = %self.path.display(), ports = ports.len(), "opened VCD trace");
        Ok(())
    }

    fn capture(&mut self, time: VirtualTime, snapshot: &Snapshot<'_>) -> Result<(), TraceError> {
        let writer = self.writer.as_mut().ok_or(TraceError::NotOpen)?;
        check_order(self.last_time, time)?;
        for (id, _, value) in snapshot.iter() {
            if let Some(slot) = self.values.get_mut(id.index()) {
                *slot = value;
            }
        }
        writer.record(time.as_u64(), &self.values)?;
        self.last_time = Some(time);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TraceError> {
        let writer = self.writer.take().ok_or(TraceError::NotOpen)?;
        let end_time = self.last_time.map(|t| t.as_u64() + 1);
        writer.finish(end_time)?.finish()?;
        tracing::debug!(path = %self.path.display(), "closed VCD trace");
        Ok(())
    }

    fn abandon(&mut self) {
        drop(self.writer.take());
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::warn!(path = %self.path.display(), "removed incomplete trace");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not remove incomplete trace");
            }
        }
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

/// Accepts and discards captures, still enforcing timestamp order.
#[derive(Debug, Default)]
pub struct NullTraceSink {
    open: bool,
    last_time: Option<VirtualTime>,
    captures: u64,
}

impl NullTraceSink {
    /// Creates a closed sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of captures accepted so far.
    pub fn captures(&self) -> u64 {
        self.captures
    }
}

impl TraceSink for NullTraceSink {
    fn open(&mut self, _name: &str, _ports: &[PortDecl]) -> Result<(), TraceError> {
        self.open = true;
        Ok(())
    }

    fn capture(&mut self, time: VirtualTime, _snapshot: &Snapshot<'_>) -> Result<(), TraceError> {
        if !self.open {
            return Err(TraceError::NotOpen);
        }
        check_order(self.last_time, time)?;
        self.last_time = Some(time);
        self.captures += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TraceError> {
        if !self.open {
            return Err(TraceError::NotOpen);
        }
        self.open = false;
        Ok(())
    }
}

/// Owns a sink for the length of a run and guarantees it is either closed
/// or abandoned on every exit path.
pub struct TraceGuard<S: TraceSink> {
    sink: S,
    opened: bool,
    closed: bool,
    captures: u64,
}

impl<S: TraceSink> TraceGuard<S> {
    /// Wraps an unopened sink.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            opened: false,
            closed: false,
            captures: 0,
        }
    }

    /// Opens the underlying sink.
    pub fn open(&mut self, name: &str, ports: &[PortDecl]) -> Result<(), TraceError> {
        self.sink.open(name, ports)?;
        self.opened = true;
        Ok(())
    }

    /// Forwards one capture to the sink.
    pub fn capture(&mut self, time: VirtualTime, snapshot: &Snapshot<'_>) -> Result<(), TraceError> {
        self.sink.capture(time, snapshot)?;
        self.captures += 1;
        Ok(())
    }

    /// Number of captures the sink accepted.
    pub fn captures(&self) -> u64 {
        self.captures
    }

    /// Where the sink writes, if anywhere.
    pub fn location(&self) -> Option<&Path> {
        self.sink.location()
    }

    /// Closes the sink. A failed close leaves the trace to be abandoned on drop.
    pub fn close(&mut self) -> Result<(), TraceError> {
        if self.closed {
            return Ok(());
        }
        self.sink.close()?;
        self.closed = true;
        Ok(())
    }
}

impl<S: TraceSink> Drop for TraceGuard<S> {
    fn drop(&mut self) {
        if self.opened && !self.closed {
            self.sink.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::signal::SignalInterface;
    use crate::value::{PortId, PortTable};
    use std::io::Read;

    struct Ports(PortTable);

    impl Ports {
        fn new() -> Self {
            Ports(PortTable::new(vec![
                PortDecl::input("clk", 1),
                PortDecl::input("data", 4),
            ]))
        }

        fn set(&mut self, clk: u64, data: u64) {
            self.0.drive(PortId::from_raw(0), clk);
            self.0.drive(PortId::from_raw(1), data);
        }
    }

    impl SignalInterface for Ports {
        fn ports(&self) -> &[PortDecl] {
            self.0.decls()
        }

        fn get(&self, port: PortId) -> u64 {
            self.0.get(port)
        }

        fn set_input(&mut self, port: PortId, value: u64) -> Result<(), ModelError> {
            self.0.set_input(port, value)
        }

        fn evaluate(&mut self) -> Result<(), ModelError> {
            Ok(())
        }
    }

    fn writer_output(build: impl FnOnce(&mut VcdWriter<Vec<u8>>)) -> String {
        let ports = Ports::new();
        let mut w = VcdWriter::new(Vec::new(), "top", "1ns", ports.ports()).unwrap();
        build(&mut w);
        String::from_utf8(w.finish(None).unwrap()).unwrap()
    }

    #[test]
    fn id_code_first() {
        assert_eq!(VcdWriter::<Vec<u8>>::make_id_code(0), "!");
    }

    #[test]
    fn id_code_sequential() {
        assert_eq!(VcdWriter::<Vec<u8>>::make_id_code(1), "\"");
        assert_eq!(VcdWriter::<Vec<u8>>::make_id_code(93), "~");
    }

    #[test]
    fn id_code_multi_char() {
        assert_eq!(VcdWriter::<Vec<u8>>::make_id_code(94).len(), 2);
    }

    #[test]
    fn format_values() {
        assert_eq!(VcdWriter::<Vec<u8>>::format_value(0, 1), "0");
        assert_eq!(VcdWriter::<Vec<u8>>::format_value(1, 1), "1");
        assert_eq!(VcdWriter::<Vec<u8>>::format_value(0b1010, 4), "b1010");
        assert_eq!(VcdWriter::<Vec<u8>>::format_value(1, 3), "b001");
    }

    #[test]
    fn header_contents() {
        let out = writer_output(|_| {});
        assert!(out.contains("$version"));
        assert!(out.contains("clockstep cycle driver"));
        assert!(out.contains("$timescale\n  1ns\n$end"));
        assert!(out.contains("$scope module top $end"));
        assert!(out.contains("$var wire 1 ! clk $end"));
        assert!(out.contains("$var wire 4 \" data $end"));
        assert!(out.contains("$upscope $end"));
        assert!(out.contains("$enddefinitions $end"));
    }

    #[test]
    fn first_record_dumps_everything() {
        let out = writer_output(|w| w.record(0, &[0, 0b0011]).unwrap());
        assert!(out.contains("#0\n$dumpvars\n0!\nb0011 \"\n$end\n"));
    }

    #[test]
    fn later_records_only_write_changes() {
        let out = writer_output(|w| {
            w.record(0, &[0, 5]).unwrap();
            w.record(1, &[1, 5]).unwrap();
            w.record(2, &[0, 6]).unwrap();
        });
        assert!(out.contains("#1\n1!\n"));
        assert!(!out.contains("b0101 \"\n#1"), "unchanged data must not be rewritten");
        assert!(out.contains("#2\n0!\nb0110 \"\n"));
    }

    #[test]
    fn unchanged_record_writes_no_timestamp() {
        let out = writer_output(|w| {
            w.record(0, &[1, 1]).unwrap();
            w.record(1, &[1, 1]).unwrap();
        });
        assert!(!out.contains("#1"));
    }

    #[test]
    fn scope_name_replaces_whitespace() {
        assert_eq!(scope_name("my run"), "my_run");
        assert_eq!(scope_name(""), "top");
    }

    #[test]
    fn vcd_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.vcd");
        let mut ports = Ports::new();
        let mut sink = VcdTraceSink::new(&path, "1ns", false);
        sink.open("run", ports.ports()).unwrap();
        for t in 0..4 {
            ports.set(t % 2, t / 2);
            sink.capture(VirtualTime::from_raw(t), &Snapshot::of(&ports))
                .unwrap();
        }
        sink.close().unwrap();

        let out = std::fs::read_to_string(&path).unwrap();
        assert!(out.contains("$dumpvars"));
        assert!(out.contains("#3\n1!\n"));
        assert!(out.trim_end().ends_with("#4"));
        assert_eq!(sink.location(), Some(path.as_path()));
    }

    #[test]
    fn vcd_sink_gzip_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.vcd.gz");
        let ports = Ports::new();
        let mut sink = VcdTraceSink::new(&path, "10ps", true);
        sink.open("run", ports.ports()).unwrap();
        sink.capture(VirtualTime::from_raw(0), &Snapshot::of(&ports))
            .unwrap();
        sink.close().unwrap();

        let file = File::open(&path).unwrap();
        let mut text = String::new();
        flate2::read::GzDecoder::new(file)
            .read_to_string(&mut text)
            .unwrap();
        assert!(text.contains("10ps"));
        assert!(text.contains("$dumpvars"));
    }

    #[test]
    fn vcd_sink_rejects_out_of_order() {
        let dir = tempfile::tempdir().unwrap();
        let ports = Ports::new();
        let mut sink = VcdTraceSink::new(dir.path().join("t.vcd"), "1ns", false);
        sink.open("t", ports.ports()).unwrap();
        sink.capture(VirtualTime::from_raw(4), &Snapshot::of(&ports))
            .unwrap();
        let err = sink
            .capture(VirtualTime::from_raw(4), &Snapshot::of(&ports))
            .unwrap_err();
        assert!(matches!(err, TraceError::NonMonotonic { .. }));
    }

    #[test]
    fn vcd_sink_capture_before_open_errors() {
        let ports = Ports::new();
        let mut sink = VcdTraceSink::new("unused.vcd", "1ns", false);
        let err = sink
            .capture(VirtualTime::from_raw(0), &Snapshot::of(&ports))
            .unwrap_err();
        assert!(matches!(err, TraceError::NotOpen));
    }

    #[test]
    fn vcd_sink_open_failure() {
        let mut sink = VcdTraceSink::new("/nonexistent/dir/run.vcd", "1ns", false);
        let err = sink.open("run", &[]).unwrap_err();
        assert!(matches!(err, TraceError::Open { .. }));
    }

    #[test]
    fn abandon_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.vcd");
        let ports = Ports::new();
        let mut sink = VcdTraceSink::new(&path, "1ns", false);
        sink.open("p", ports.ports()).unwrap();
        assert!(path.exists());
        sink.abandon();
        assert!(!path.exists());
    }

    #[test]
    fn guard_abandons_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guarded.vcd");
        let ports = Ports::new();
        {
            let mut guard = TraceGuard::new(VcdTraceSink::new(&path, "1ns", false));
            guard.open("g", ports.ports()).unwrap();
            guard
                .capture(VirtualTime::from_raw(0), &Snapshot::of(&ports))
                .unwrap();
            assert_eq!(guard.captures(), 1);
        }
        assert!(!path.exists());
    }

    #[test]
    fn guard_keeps_closed_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kept.vcd");
        let ports = Ports::new();
        {
            let mut guard = TraceGuard::new(VcdTraceSink::new(&path, "1ns", false));
            guard.open("k", ports.ports()).unwrap();
            guard.close().unwrap();
            guard.close().unwrap();
        }
        assert!(path.exists());
    }

    #[test]
    fn null_sink_counts_and_orders() {
        let ports = Ports::new();
        let mut sink = NullTraceSink::new();
        assert!(matches!(
            sink.capture(VirtualTime::from_raw(0), &Snapshot::of(&ports)),
            Err(TraceError::NotOpen)
        ));
        sink.open("n", ports.ports()).unwrap();
        sink.capture(VirtualTime::from_raw(0), &Snapshot::of(&ports))
            .unwrap();
        sink.capture(VirtualTime::from_raw(1), &Snapshot::of(&ports))
            .unwrap();
        assert!(sink
            .capture(VirtualTime::from_raw(1), &Snapshot::of(&ports))
            .is_err());
        assert_eq!(sink.captures(), 2);
        sink.close().unwrap();
        assert!(sink.close().is_err());
    }

    #[test]
    fn trace_location_checks() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_trace_location(&dir.path().join("ok.vcd")).is_ok());
        assert!(check_trace_location(dir.path()).is_err());
        assert!(check_trace_location(&dir.path().join("missing").join("x.vcd")).is_err());
        assert!(check_trace_location(Path::new("")).is_err());
        assert!(check_trace_location(Path::new("relative.vcd")).is_ok());
    }

    #[test]
    fn trace_location_check_leaves_no_files() {
        let dir = tempfile::tempdir().unwrap();
        check_trace_location(&dir.path().join("run.vcd")).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn trace_location_in_unwritable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        let result = check_trace_location(&locked.join("run.vcd"));
        let creatable = std::fs::File::create(locked.join("x")).is_ok();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Privileged users can write anywhere; the check must agree with File::create.
        assert_eq!(result.is_ok(), creatable);
        if let Err(err) = result {
            assert!(matches!(err, ConfigError::TraceLocation { .. }));
            assert!(err.to_string().contains("not writable"));
        }
    }
}
