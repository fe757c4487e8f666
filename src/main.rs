//! agent-kernel demo binary.
//!
//! Runs the parent/children handshake: every child reports `ready`, the parent
//! broadcasts `go` once all have, each child answers with an acknowledged
//! `done`, and the parent halts after the last one (taking the children with
//! it through the halt cascade).

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;

use agent_kernel::{state, Agent, AgentId, Config, Context, Kernel, Result, State, Transition};

#[derive(Debug, Parser)]
#[command(name = "agent-kernel", version, about = "Message-driven agent kernel demos")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parent/children ready-go-done handshake.
    Handshake {
        /// Number of children the parent spawns.
        #[arg(long, default_value_t = 2)]
        children: usize,

        /// Write the per-agent trace.
        #[arg(long)]
        debug: bool,

        /// Wait for enter before every cycle.
        #[arg(long)]
        step: bool,

        /// Write traces to one file per agent instead of stderr (implies --debug).
        #[arg(long, value_name = "DIR")]
        trace_dir: Option<PathBuf>,

        /// Print every emitted message as a JSON line.
        #[arg(long)]
        journal: bool,
    },
}

#[derive(Debug)]
struct Parent {
    children: usize,
    awaiting_ready: usize,
    awaiting_done: usize,
}

impl Parent {
    fn new(children: usize) -> Self {
        Self {
            children,
            awaiting_ready: children,
            awaiting_done: children,
        }
    }

    fn start(&mut self, ctx: &mut Context<'_, Self>) -> Transition<Self> {
        for _ in 0..self.children {
            match ctx.spawn(|| Ok(Child)) {
                Ok(child) => ctx.when_from("ready", child, state!(on_ready)),
                Err(err) => {
                    tracing::error!(error = %err, "child spawn failed");
                    return Some(State::Halt);
                }
            }
        }
        if self.children == 0 {
            return Some(State::Halt);
        }
        None
    }

    fn on_ready(&mut self, ctx: &mut Context<'_, Self>) -> Transition<Self> {
        self.awaiting_ready -= 1;
        if self.awaiting_ready == 0 {
            ctx.when("done", state!(on_done));
            ctx.emit("go", json!(null));
        }
        None
    }

    fn on_done(&mut self, ctx: &mut Context<'_, Self>) -> Transition<Self> {
        self.awaiting_done -= 1;
        let child = ctx.message().map_or(AgentId::ROOT, |m| m.emitter());
        tracing::info!(child = %child, left = self.awaiting_done, "done");
        (self.awaiting_done == 0).then_some(State::Halt)
    }
}

impl Agent for Parent {
    fn initial_state(&self) -> State<Self> {
        state!(start)
    }
}

#[derive(Debug, Default)]
struct Child;

impl Child {
    fn start(&mut self, ctx: &mut Context<'_, Self>) -> Transition<Self> {
        let parent = ctx.parent();
        ctx.emit_to(parent, "ready", json!(null));
        ctx.when_from("go", parent, state!(on_go));
        None
    }

    fn on_go(&mut self, ctx: &mut Context<'_, Self>) -> Transition<Self> {
        let parent = ctx.parent();
        let me = ctx.id().as_u64();
        ctx.request(parent, "done", json!({ "child": me }), state!(on_acked));
        None
    }

    fn on_acked(&mut self, ctx: &mut Context<'_, Self>) -> Transition<Self> {
        tracing::debug!(agent = %ctx.id(), "done acknowledged");
        None
    }
}

impl Agent for Child {
    fn initial_state(&self) -> State<Self> {
        state!(start)
    }
}

fn main() -> Result<()> {
    agent_kernel::observability::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Handshake {
            children,
            debug,
            step,
            trace_dir,
            journal,
        } => {
            let mut config = Config::from_env().kernel;
            config.debug |= debug || trace_dir.is_some();
            config.step |= step;
            config.journal |= journal;
            if trace_dir.is_some() {
                config.trace_dir = trace_dir;
            }

            let mut kernel = Kernel::new(config);
            let stats = kernel.run(|| Ok(Parent::new(children)))?;

            let mut out = io::stdout().lock();
            if kernel.config().journal {
                for message in kernel.journal() {
                    writeln!(out, "{}", serde_json::to_string(message)?)?;
                }
            }
            writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
        }
    }

    Ok(())
}
