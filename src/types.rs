use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future used at the trait seams (launcher, child
/// processes, task functions).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Role tag of a supervised child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRole {
    /// Background job worker draining the queues.
    Worker,
    /// Frontend asset bundler in watch mode (development only).
    AssetDevServer,
    /// HTTP server run in the foreground.
    HttpServer,
}

impl ProcessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessRole::Worker => "worker",
            ProcessRole::AssetDevServer => "asset-dev-server",
            ProcessRole::HttpServer => "http-server",
        }
    }
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
