//! Per-agent text trace (the debug display hook).
//!
//! When `debug` is on, the kernel writes a line-oriented trace for every
//! emitted message and every cycle to one sink per agent. Lines starting with
//! [`TITLE_PREFIX`] are titles (agent label and current state); everything
//! else is body text. A viewer on the other end of a sink may go away at any
//! time: write failures are logged and the sink is dropped, never propagated.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, LineWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;

use crate::types::AgentId;

/// Marker that starts a title line.
pub const TITLE_PREFIX: char = '#';

/// Destination for one agent's trace lines.
#[cfg_attr(test, mockall::automock)]
pub trait TraceSink {
    /// Write one line (without trailing newline).
    fn write_line(&mut self, line: &str) -> io::Result<()>;
}

/// Opens a sink for each spawned agent.
pub trait SinkFactory {
    fn open(&mut self, agent: AgentId, label: &str) -> io::Result<Box<dyn TraceSink>>;
}

// =============================================================================
// Tracer
// =============================================================================

/// Owns the factory and the open sinks.
pub struct Tracer {
    factory: Option<Box<dyn SinkFactory>>,
    sinks: HashMap<AgentId, Box<dyn TraceSink>>,
}

impl Tracer {
    pub fn disabled() -> Self {
        Self {
            factory: None,
            sinks: HashMap::new(),
        }
    }

    pub fn new(factory: Box<dyn SinkFactory>) -> Self {
        Self {
            factory: Some(factory),
            sinks: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.factory.is_some()
    }

    pub(crate) fn open(&mut self, agent: AgentId, label: &str) {
        let Some(factory) = self.factory.as_mut() else {
            return;
        };
        match factory.open(agent, label) {
            Ok(sink) => {
                self.sinks.insert(agent, sink);
                self.title(agent, &format!("{label} ({agent})"));
            }
            Err(err) => {
                tracing::debug!(agent = %agent, error = %err, "trace sink unavailable");
            }
        }
    }

    pub(crate) fn title(&mut self, agent: AgentId, title: &str) {
        self.write(agent, &format!("{TITLE_PREFIX}{title}"));
    }

    /// Body line; `line` is only evaluated if the agent has an open sink.
    pub(crate) fn line(&mut self, agent: AgentId, line: impl FnOnce() -> String) {
        if self.sinks.contains_key(&agent) {
            let line = line();
            self.write(agent, &line);
        }
    }

    pub(crate) fn close(&mut self, agent: AgentId) {
        self.sinks.remove(&agent);
    }

    fn write(&mut self, agent: AgentId, line: &str) {
        let Some(sink) = self.sinks.get_mut(&agent) else {
            return;
        };
        if let Err(err) = sink.write_line(line) {
            tracing::debug!(agent = %agent, error = %err, "trace sink closed; dropping it");
            self.sinks.remove(&agent);
        }
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("enabled", &self.is_enabled())
            .field("open_sinks", &self.sinks.len())
            .finish()
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Sink over any writer, each line optionally prefixed.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
    prefix: String,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            prefix: String::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

impl<W: Write> TraceSink for WriterSink<W> {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.writer, "{}{}", self.prefix, line)?;
        self.writer.flush()
    }
}

/// All agents share stderr; lines are prefixed with `[agent-N] `.
#[derive(Debug, Default)]
pub struct StderrSinks;

impl SinkFactory for StderrSinks {
    fn open(&mut self, agent: AgentId, _label: &str) -> io::Result<Box<dyn TraceSink>> {
        Ok(Box::new(WriterSink::new(io::stderr()).with_prefix(format!("[{agent}] "))))
    }
}

/// One `agent-<id>.log` file per agent under a directory.
#[derive(Debug, Clone)]
pub struct DirectorySinks {
    dir: PathBuf,
}

impl DirectorySinks {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, agent: AgentId) -> PathBuf {
        self.dir.join(format!("agent-{}.log", agent.as_u64()))
    }
}

impl SinkFactory for DirectorySinks {
    fn open(&mut self, agent: AgentId, _label: &str) -> io::Result<Box<dyn TraceSink>> {
        fs::create_dir_all(&self.dir)?;
        let file = File::create(self.path_for(agent))?;
        Ok(Box::new(WriterSink::new(LineWriter::new(file))))
    }
}

/// In-memory trace shared between the kernel and whoever inspects it.
#[derive(Debug, Clone, Default)]
pub struct MemoryTrace {
    lines: Rc<RefCell<BTreeMap<AgentId, Vec<String>>>>,
}

impl MemoryTrace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written for `agent` so far, titles included.
    pub fn lines(&self, agent: AgentId) -> Vec<String> {
        self.lines.borrow().get(&agent).cloned().unwrap_or_default()
    }

    /// Agents that ever had a sink opened.
    pub fn agents(&self) -> Vec<AgentId> {
        self.lines.borrow().keys().copied().collect()
    }
}

impl SinkFactory for MemoryTrace {
    fn open(&mut self, agent: AgentId, _label: &str) -> io::Result<Box<dyn TraceSink>> {
        self.lines.borrow_mut().entry(agent).or_default();
        Ok(Box::new(MemorySink {
            agent,
            lines: Rc::clone(&self.lines),
        }))
    }
}

struct MemorySink {
    agent: AgentId,
    lines: Rc<RefCell<BTreeMap<AgentId, Vec<String>>>>,
}

impl TraceSink for MemorySink {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.lines
            .borrow_mut()
            .entry(self.agent)
            .or_default()
            .push(line.to_string());
        Ok(())
    }
}
