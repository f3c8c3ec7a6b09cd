use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use stackctl::config::Settings;
use stackctl::errors::{Result, StackError};
use stackctl::orchestrator::ProcessLauncher;
use stackctl::supervisor::{ChildProcess, ServerInvocation};
use stackctl::types::{BoxFuture, ProcessRole};

/// Something the orchestrator asked the launcher to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchEvent {
    Started(ProcessRole),
    ServerInvoked(ServerInvocation),
    Terminated(ProcessRole),
}

#[derive(Debug, Clone, Copy)]
enum ServerBehaviour {
    Exit(i32),
    Fail,
    Hang,
}

#[derive(Default)]
struct Shared {
    events: Vec<LaunchEvent>,
    terminations: HashMap<ProcessRole, usize>,
}

/// A fake launcher that:
/// - records starts, the server invocation and terminations in order
/// - can fail or stall a chosen spawn, or fail a termination
/// - "runs" the server by returning a fixed exit code (or never returning).
///
/// Clones share the same record, so keep one to inspect after handing the
/// other to the orchestrator.
#[derive(Clone)]
pub struct FakeLauncher {
    shared: Arc<Mutex<Shared>>,
    server: ServerBehaviour,
    fail_spawn: Option<ProcessRole>,
    stall_spawn: Option<ProcessRole>,
    fail_terminate: Option<ProcessRole>,
}

impl FakeLauncher {
    /// Server exits with code 0.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            server: ServerBehaviour::Exit(0),
            fail_spawn: None,
            stall_spawn: None,
            fail_terminate: None,
        }
    }

    pub fn server_exit_code(mut self, code: i32) -> Self {
        self.server = ServerBehaviour::Exit(code);
        self
    }

    /// The server never exits; only the shutdown future ends the run.
    pub fn server_hangs(mut self) -> Self {
        self.server = ServerBehaviour::Hang;
        self
    }

    /// The server cannot be launched.
    pub fn server_fails(mut self) -> Self {
        self.server = ServerBehaviour::Fail;
        self
    }

    pub fn fail_spawn(mut self, role: ProcessRole) -> Self {
        self.fail_spawn = Some(role);
        self
    }

    /// Starting `role` never completes; only the shutdown future moves the
    /// run on.
    pub fn stall_spawn(mut self, role: ProcessRole) -> Self {
        self.stall_spawn = Some(role);
        self
    }

    pub fn fail_terminate(mut self, role: ProcessRole) -> Self {
        self.fail_terminate = Some(role);
        self
    }

    pub fn events(&self) -> Vec<LaunchEvent> {
        self.shared.lock().unwrap().events.clone()
    }

    pub fn terminations(&self, role: ProcessRole) -> usize {
        self.shared
            .lock()
            .unwrap()
            .terminations
            .get(&role)
            .copied()
            .unwrap_or(0)
    }

    pub fn started(&self) -> Vec<ProcessRole> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LaunchEvent::Started(role) => Some(role),
                _ => None,
            })
            .collect()
    }

    pub fn invocation(&self) -> Option<ServerInvocation> {
        self.events().into_iter().find_map(|e| match e {
            LaunchEvent::ServerInvoked(inv) => Some(inv),
            _ => None,
        })
    }

    async fn start(&self, role: ProcessRole) -> Result<Box<dyn ChildProcess>> {
        if self.stall_spawn == Some(role) {
            std::future::pending::<()>().await;
        }
        if self.fail_spawn == Some(role) {
            return Err(StackError::ProcessSpawn {
                role,
                source: io::Error::new(io::ErrorKind::NotFound, "fake spawn failure"),
            });
        }
        self.shared
            .lock()
            .unwrap()
            .events
            .push(LaunchEvent::Started(role));
        Ok(Box::new(FakeChild {
            role,
            shared: Arc::clone(&self.shared),
            fail: self.fail_terminate == Some(role),
            exit: ServerBehaviour::Hang,
        }))
    }
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLauncher for FakeLauncher {
    fn start_worker<'a>(
        &'a mut self,
        _settings: &'a Settings,
    ) -> BoxFuture<'a, Result<Box<dyn ChildProcess>>> {
        Box::pin(self.start(ProcessRole::Worker))
    }

    fn start_asset_dev_server<'a>(
        &'a mut self,
        _settings: &'a Settings,
    ) -> BoxFuture<'a, Result<Box<dyn ChildProcess>>> {
        Box::pin(self.start(ProcessRole::AssetDevServer))
    }

    fn start_http_server<'a>(
        &'a mut self,
        invocation: ServerInvocation,
        _settings: &'a Settings,
    ) -> BoxFuture<'a, Result<Box<dyn ChildProcess>>> {
        Box::pin(async move {
            if self.stall_spawn == Some(ProcessRole::HttpServer) {
                std::future::pending::<()>().await;
            }
            self.shared
                .lock()
                .unwrap()
                .events
                .push(LaunchEvent::ServerInvoked(invocation));

            if let ServerBehaviour::Fail = self.server {
                return Err(StackError::ProcessSpawn {
                    role: ProcessRole::HttpServer,
                    source: io::Error::new(io::ErrorKind::NotFound, "fake server failure"),
                });
            }
            Ok(Box::new(FakeChild {
                role: ProcessRole::HttpServer,
                shared: Arc::clone(&self.shared),
                fail: self.fail_terminate == Some(ProcessRole::HttpServer),
                exit: self.server,
            }) as Box<dyn ChildProcess>)
        })
    }
}

/// Child handed out by [`FakeLauncher`]. Counts every `terminate` call.
struct FakeChild {
    role: ProcessRole,
    shared: Arc<Mutex<Shared>>,
    fail: bool,
    /// What `wait` does; everything but the server runs until terminated.
    exit: ServerBehaviour,
}

impl ChildProcess for FakeChild {
    fn role(&self) -> ProcessRole {
        self.role
    }

    fn wait(&mut self) -> BoxFuture<'_, Result<i32>> {
        let exit = self.exit;
        Box::pin(async move {
            match exit {
                ServerBehaviour::Exit(code) => Ok(code),
                ServerBehaviour::Fail | ServerBehaviour::Hang => std::future::pending().await,
            }
        })
    }

    fn terminate(&mut self) -> BoxFuture<'_, Result<()>> {
        {
            let mut shared = self.shared.lock().unwrap();
            shared.events.push(LaunchEvent::Terminated(self.role));
            *shared.terminations.entry(self.role).or_insert(0) += 1;
        }
        let role = self.role;
        let fail = self.fail;

        Box::pin(async move {
            if fail {
                return Err(StackError::ChildTermination {
                    role,
                    source: io::Error::other("fake termination failure"),
                });
            }
            Ok(())
        })
    }
}
