//! IPC transport via Unix domain sockets.

use compio::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

/// Connect to a Unix domain socket.
pub async fn connect<P: AsRef<Path>>(path: P) -> std::io::Result<UnixStream> {
    UnixStream::connect(path).await
}

/// Bind a Unix domain socket listener.
///
/// Creates missing parent directories and removes a stale socket file left by
/// a previous run. The returned guard deletes the socket file when dropped.
pub async fn bind<P: AsRef<Path>>(path: P) -> std::io::Result<(UnixListener, SocketFileGuard)> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if path.exists() {
        tracing::debug!(path = %path.display(), "Removing stale IPC socket");
        std::fs::remove_file(path)?;
    }

    let listener = UnixListener::bind(path).await?;
    Ok((listener, SocketFileGuard::new(path)))
}

/// Accept a connection on a Unix domain socket listener.
pub async fn accept(listener: &UnixListener) -> std::io::Result<UnixStream> {
    let (stream, _addr) = listener.accept().await?;
    Ok(stream)
}

/// Removes an IPC socket file on drop.
#[derive(Debug)]
pub struct SocketFileGuard {
    path: PathBuf,
}

impl SocketFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketFileGuard {
    fn drop(&mut self) {
        if !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed IPC socket"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove IPC socket"
            ),
        }
    }
}
