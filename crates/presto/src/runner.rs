// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Child process supervision.
//!
//! The runner forks the generated server entry and keeps it alive
//! across rebuilds. Readiness is reported by the child over the IPC
//! protocol (see [`crate::ipc`]); control lines are intercepted from the
//! child's stdout and everything else is forwarded verbatim.
//!
//! Restart policy: a child that reached readiness and exits with a
//! nonzero code is restarted automatically; a clean exit or an exit
//! before readiness waits for the next change-triggered restart. The
//! compiler bridge restarts on server-targeted changes (or full builds)
//! and sends a `client_update` message for client-only changes.

use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc, Notify};

use crate::compiler::Compiler;
use crate::error::{Error, Result};
use crate::events::{CompileSummary, CompilerEvent};
use crate::file::Target;
use crate::ipc::{self, IpcMessage};

/// Lifecycle state of the supervised child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// No child process.
    Stopped,
    /// Child forked, readiness not yet reported.
    Starting,
    /// Child reported readiness.
    Ready,
    /// Child is going down.
    Exiting,
}

/// Events emitted by the runner.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    /// A child was forked.
    Start,
    /// The child reported readiness with its bound address.
    Ready {
        /// Address the child bound to.
        address: String,
    },
    /// The child exited.
    Exit {
        /// Exit code; `None` when killed by a signal.
        code: Option<i32>,
    },
    /// An intentional restart began (before the kill), so observers can
    /// tell it apart from a crash.
    Restart,
    /// `kill()` was requested.
    Kill,
    /// Spawning or supervising the child failed.
    Error {
        /// What went wrong.
        message: String,
    },
}

/// Options for the supervised child.
#[derive(Debug, Clone, Default)]
pub struct RunnerOptions {
    /// Command to run the server entry with; defaults to the compiler's
    /// configured command.
    pub command: Option<String>,
    /// Extra arguments appended after the server entry path.
    pub args: Vec<String>,
}

/// What the bridge decided to do with a completed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeAction {
    /// Restart the child.
    Restart,
    /// Notify the child of a client-only update.
    ClientUpdate,
    /// Nothing changed that the child cares about.
    None,
}

/// Applies the restart policy to a build summary.
///
/// Any server-targeted change, or a full build, forces a restart; a
/// change restricted to the client side only notifies the child.
pub fn bridge_action(summary: &CompileSummary) -> BridgeAction {
    if summary.full || summary.touches(Target::Server) {
        BridgeAction::Restart
    } else if summary.touches(Target::Client) {
        BridgeAction::ClientUpdate
    } else {
        BridgeAction::None
    }
}

struct ChildHandle {
    ipc_tx: mpsc::UnboundedSender<IpcMessage>,
    kill: Arc<Notify>,
}

struct Shared {
    state: RunnerState,
    ready: bool,
    first_run: bool,
    restarting: bool,
    generation: u64,
    child: Option<ChildHandle>,
}

struct Inner {
    compiler: Compiler,
    options: RunnerOptions,
    shared: Mutex<Shared>,
    events: broadcast::Sender<RunnerEvent>,
}

/// Forks and monitors the generated server entry.
///
/// Cheap to clone; clones share the supervised child.
#[derive(Clone)]
pub struct Runner {
    inner: Arc<Inner>,
}

impl Runner {
    /// Creates a runner over the given compiler's build directory.
    pub fn new(compiler: &Compiler, options: RunnerOptions) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                compiler: compiler.clone(),
                options,
                shared: Mutex::new(Shared {
                    state: RunnerState::Stopped,
                    ready: false,
                    first_run: true,
                    restarting: false,
                    generation: 0,
                    child: None,
                }),
                events,
            }),
        }
    }

    /// Current supervision state.
    pub fn state(&self) -> RunnerState {
        self.lock().state
    }

    /// Whether a child is currently running.
    pub fn running(&self) -> bool {
        self.lock().child.is_some()
    }

    /// Whether the current child reported readiness.
    pub fn ready(&self) -> bool {
        self.lock().ready
    }

    /// Whether no child has exited yet.
    pub fn first_run(&self) -> bool {
        self.lock().first_run
    }

    /// Subscribes to runner events.
    pub fn subscribe(&self) -> broadcast::Receiver<RunnerEvent> {
        self.inner.events.subscribe()
    }

    /// Forks the server entry. A no-op when a child is already running.
    pub fn start(&self) -> Result<()> {
        let entry = self.inner.compiler.build_dir().join("server.js");
        let command = self
            .inner
            .options
            .command
            .clone()
            .unwrap_or_else(|| self.inner.compiler.options().command.clone());

        let mut shared = self.lock();
        if shared.child.is_some() {
            return Ok(());
        }
        shared.state = RunnerState::Starting;
        shared.ready = false;
        shared.generation += 1;
        let generation = shared.generation;
        drop(shared);

        let mut child = Command::new(&command)
            .arg(&entry)
            .args(&self.inner.options.args)
            .current_dir(self.inner.compiler.root())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                self.lock().state = RunnerState::Stopped;
                Error::Process(format!("failed to spawn '{}': {}", command, e))
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (ipc_tx, mut ipc_rx) = mpsc::unbounded_channel::<IpcMessage>();
        let kill = Arc::new(Notify::new());

        {
            let mut shared = self.lock();
            shared.child = Some(ChildHandle {
                ipc_tx: ipc_tx.clone(),
                kill: kill.clone(),
            });
        }

        // parent -> child messages as JSON lines on stdin
        if let Some(mut stdin) = stdin {
            tokio::spawn(async move {
                while let Some(message) = ipc_rx.recv().await {
                    let line = ipc::encode(&message);
                    if stdin.write_all(line.as_bytes()).await.is_err() {
                        break;
                    }
                    let _ = stdin.flush().await;
                }
            });
        }

        // child stdout: intercept control lines, forward the rest
        let stdout_task = stdout.map(|stdout| {
            let runner = self.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    match ipc::parse_line(&line) {
                        Some(IpcMessage::Ready { address }) => {
                            runner.on_ready(generation, address);
                        }
                        Some(IpcMessage::Ping { value }) => {
                            let _ = runner.send(IpcMessage::Pong { value });
                        }
                        Some(_) => {}
                        None => println!("{}", line),
                    }
                }
            })
        });

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    eprintln!("{}", line);
                }
            });
        }

        // exit monitor owns the child handle
        let runner = self.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill.notified() => {
                    let _ = child.kill().await;
                    child.wait().await
                }
            };
            // drain remaining control lines before acting on the exit,
            // so a ready sent just before death is not lost; bounded, as
            // a grandchild may hold the pipe open past the kill
            if let Some(task) = stdout_task {
                let _ =
                    tokio::time::timeout(std::time::Duration::from_millis(500), task).await;
            }
            let code = status.ok().and_then(|s| s.code());
            runner.on_exit(generation, code).await;
        });

        let _ = self.inner.events.send(RunnerEvent::Start);
        Ok(())
    }

    /// Sends a message to the running child.
    pub fn send(&self, message: IpcMessage) -> Result<()> {
        let shared = self.lock();
        let child = shared
            .child
            .as_ref()
            .ok_or_else(|| Error::Process("no child process running".to_string()))?;
        child
            .ipc_tx
            .send(message)
            .map_err(|_| Error::Process("child stdin closed".to_string()))
    }

    /// Signals the child to terminate and resolves once it exited.
    pub async fn kill(&self) {
        let mut events = self.subscribe();
        let target = {
            let shared = self.lock();
            let Some(child) = shared.child.as_ref() else {
                return;
            };
            let _ = self.inner.events.send(RunnerEvent::Kill);
            child.kill.notify_one();
            shared.generation
        };

        loop {
            {
                let shared = self.lock();
                if shared.child.is_none() || shared.generation != target {
                    break;
                }
            }
            match events.recv().await {
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Kills the current child (if any) and forks a fresh one.
    ///
    /// Emits [`RunnerEvent::Restart`] first so observers can tell an
    /// intentional restart from a crash.
    pub async fn restart(&self) -> Result<()> {
        let _ = self.inner.events.send(RunnerEvent::Restart);
        self.lock().restarting = true;
        self.kill().await;
        let result = self.start();
        self.lock().restarting = false;
        result
    }

    /// Bridges compiler builds to the restart policy.
    ///
    /// Listens for completed builds: server-side changes (or full
    /// builds) restart the child; client-only changes send one
    /// `client_update` message. Compile errors do nothing — the previous
    /// child keeps serving stale artifacts.
    pub fn attach(&self, compiler: &Compiler) -> tokio::task::JoinHandle<()> {
        let runner = self.clone();
        let mut rx = compiler.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(CompilerEvent::Compile { summary }) => {
                        if !runner.running() {
                            continue;
                        }
                        match bridge_action(&summary) {
                            BridgeAction::Restart => {
                                if let Err(e) = runner.restart().await {
                                    let _ = runner.inner.events.send(RunnerEvent::Error {
                                        message: e.to_string(),
                                    });
                                }
                            }
                            BridgeAction::ClientUpdate => {
                                let _ = runner.send(IpcMessage::ClientUpdate);
                            }
                            BridgeAction::None => {}
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn on_ready(&self, generation: u64, address: String) {
        {
            let mut shared = self.lock();
            if shared.generation != generation || shared.ready {
                // stale child, or a repeated ready message
                return;
            }
            shared.ready = true;
            shared.state = RunnerState::Ready;
        }
        tracing::debug!(address = %address, "child ready");
        let _ = self.inner.events.send(RunnerEvent::Ready { address });
    }

    async fn on_exit(&self, generation: u64, code: Option<i32>) {
        let (was_ready, restarting) = {
            let mut shared = self.lock();
            if shared.generation != generation {
                return;
            }
            shared.state = RunnerState::Exiting;
            shared.child = None;
            let was_ready = shared.ready;
            shared.ready = false;
            shared.first_run = false;
            shared.state = RunnerState::Stopped;
            (was_ready, shared.restarting)
        };

        tracing::debug!(?code, "child exited");
        let _ = self.inner.events.send(RunnerEvent::Exit { code });

        // restart only after a post-readiness crash
        let crashed = code.is_some_and(|c| c != 0);
        if was_ready && crashed && !restarting {
            if let Err(e) = self.restart().await {
                let _ = self.inner.events.send(RunnerEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.inner.shared.lock().expect("runner lock poisoned")
    }
}
