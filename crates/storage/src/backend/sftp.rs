//! SSH file-transfer storage backend.
//!
//! Folder handles derived from one configuration share a single lazily
//! established SFTP session. The first operation dials and authenticates;
//! concurrent and subsequent callers receive the same session — or the same
//! cached connection error, so an unreachable host is not hammered on every
//! call.

use crate::error::{ErrorKind, Result};
use crate::folder::{BoxSyncRead, Folder, FolderHandle, Listing};
use crate::object::{FolderDigest, Object, digest_parts};
use crate::path;
use async_trait::async_trait;
use exn::ResultExt;
use ssh2::{Session, Sftp};
use std::io::BufReader;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::OnceCell;
use tokio::task;

const DEFAULT_PORT: u16 = 22;
/// Large read buffer to amortize per-request round trips on a high-latency
/// transport.
const READ_BUFFER_SIZE: usize = 64 * 1024 * 1024;

// SFTP status codes from the protocol (RFC draft / libssh2 FX constants).
const FX_NO_SUCH_FILE: i32 = 2;
const FX_NO_SUCH_PATH: i32 = 10;

/// Credential material for an SFTP backend.
///
/// The private key takes precedence when present; the password is tried as a
/// fallback method.
#[derive(Debug, Clone, Default)]
pub struct SftpCredentials {
    pub username: String,
    pub password: Option<String>,
    pub private_key_path: Option<PathBuf>,
}

fn is_absent(err: &ssh2::Error) -> bool {
    matches!(err.code(), ssh2::ErrorCode::SFTP(FX_NO_SUCH_FILE | FX_NO_SUCH_PATH))
}

/// Dials, handshakes and authenticates a fresh SFTP session. Blocking.
///
/// Host keys are deliberately not verified (no pinning); hardening this
/// would change external behaviour for existing deployments.
fn dial(
    address: &str,
    user: &str,
    password: Option<&str>,
    private_key: Option<&Path>,
) -> std::result::Result<Sftp, String> {
    let tcp = TcpStream::connect(address).map_err(|_| format!("failed to connect to {address} via ssh"))?;
    let mut session = Session::new().map_err(|_| format!("failed to connect to {address} via ssh"))?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(|_| format!("failed to connect to {address} via ssh"))?;

    if let Some(key_path) = private_key {
        if let Err(err) = session.userauth_pubkey_file(user, None, key_path, None) {
            tracing::debug!(%address, error = %err, "public key authentication failed");
        }
    }
    if !session.authenticated()
        && let Some(pass) = password
        && let Err(err) = session.userauth_password(user, pass)
    {
        tracing::debug!(%address, error = %err, "password authentication failed");
    }
    if !session.authenticated() {
        return Err(format!("failed to authenticate to {address} as user '{user}'"));
    }

    session.sftp().map_err(|_| format!("failed to connect to {address} via sftp"))
}

/// Lazy, memoized session factory shared by all folder handles derived from
/// one configuration.
///
/// At most one underlying connection attempt is made, even under concurrent
/// first use: the `OnceCell` guarantees a single dial, and the outcome —
/// client or failure — is what every caller observes afterwards. The session
/// lives for the process lifetime; it is never reset automatically.
struct SftpConnector {
    address: String,
    credentials: SftpCredentials,
    cell: OnceCell<std::result::Result<Arc<Sftp>, String>>,
}

impl SftpConnector {
    fn new(address: String, credentials: SftpCredentials) -> Self {
        Self {
            address,
            credentials,
            cell: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<Arc<Sftp>> {
        let slot = self
            .cell
            .get_or_init(|| {
                let address = self.address.clone();
                let credentials = self.credentials.clone();
                async move {
                    let dialed = task::spawn_blocking(move || {
                        dial(
                            &address,
                            &credentials.username,
                            credentials.password.as_deref(),
                            credentials.private_key_path.as_deref(),
                        )
                    })
                    .await;
                    match dialed {
                        Ok(Ok(client)) => Ok(Arc::new(client)),
                        Ok(Err(message)) => {
                            tracing::warn!(%message, "sftp connection failed; caching the failure");
                            Err(message)
                        }
                        Err(join_err) => Err(format!("connection task failed: {join_err}")),
                    }
                }
            })
            .await;
        match slot {
            Ok(client) => Ok(Arc::clone(client)),
            Err(message) => exn::bail!(ErrorKind::Connection(message.clone())),
        }
    }
}

/// Folder rooted on an SFTP server.
pub struct SftpFolder {
    connector: Arc<SftpConnector>,
    host: String,
    path: String,
    user: String,
}

impl SftpFolder {
    /// Builds the root folder handle for one backend configuration.
    ///
    /// No connection is made here; the session is established on first use.
    pub fn configure(
        host: &str,
        port: Option<u16>,
        root_path: &str,
        credentials: SftpCredentials,
    ) -> FolderHandle {
        let address = format!("{host}:{}", port.unwrap_or(DEFAULT_PORT));
        let user = credentials.username.clone();
        Arc::new(Self {
            connector: Arc::new(SftpConnector::new(address, credentials)),
            host: host.to_string(),
            path: path::ensure_trailing_slash(root_path),
            user,
        })
    }

    fn absolute(&self, relative_path: &str) -> Result<String> {
        Ok(path::join(&self.path, &path::validate(relative_path)?))
    }
}

/// Runs a blocking SFTP job on the blocking pool, folding a lost task into a
/// backend error for the operation.
async fn run_blocking<T: Send + 'static>(
    op: &'static str,
    context_path: String,
    job: impl FnOnce() -> Result<T> + Send + 'static,
) -> Result<T> {
    task::spawn_blocking(job).await.or_raise(|| ErrorKind::backend(op, context_path))?
}

/// Creates `dir` and any missing ancestors. Blocking.
fn mkdir_all(client: &Sftp, dir: &str) -> Result<()> {
    if dir.is_empty() {
        return Ok(());
    }
    let mut current = String::new();
    if dir.starts_with('/') {
        current.push('/');
    }
    for segment in dir.split('/') {
        if segment.is_empty() {
            continue;
        }
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(segment);
        let candidate = Path::new(&current);
        if client.stat(candidate).is_ok() {
            continue;
        }
        if let Err(err) = client.mkdir(candidate, 0o755) {
            // A concurrent writer may have created it in between.
            if client.stat(candidate).is_err() {
                return Err(err).or_raise(|| ErrorKind::backend("create directory", current.clone()));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Folder for SftpFolder {
    fn path(&self) -> &str {
        &self.path
    }

    fn subfolder(&self, relative_path: &str) -> FolderHandle {
        Arc::new(Self {
            connector: Arc::clone(&self.connector),
            host: self.host.clone(),
            path: path::ensure_trailing_slash(&path::join(&self.path, relative_path)),
            user: self.user.clone(),
        })
    }

    fn digest(&self) -> FolderDigest {
        digest_parts(&["sftp", &self.host, &self.path, &self.user])
    }

    async fn list(&self) -> Result<Listing> {
        let client = self.connector.client().await?;
        let dir = self.path.clone();
        let error_dir = dir.clone();
        let entries = run_blocking("read directory", dir.clone(), move || {
            match client.readdir(Path::new(dir.trim_end_matches('/'))) {
                Ok(entries) => Ok(Some(entries)),
                Err(err) if is_absent(&err) => Ok(None),
                Err(err) => Err(err).or_raise(|| ErrorKind::backend("read directory", dir)),
            }
        })
        .await?;

        let Some(entries) = entries else {
            tracing::debug!(path = %error_dir, "folder does not exist, listing as empty");
            return Ok(Listing::default());
        };

        let mut listing = Listing::default();
        for (entry_path, stat) in entries {
            let Some(name) = entry_path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            if name == "." || name == ".." {
                continue;
            }
            if stat.is_dir() {
                listing.subfolders.push(self.subfolder(name));
            } else {
                let modified = stat
                    .mtime
                    .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs as i64).ok())
                    .unwrap_or(OffsetDateTime::UNIX_EPOCH);
                listing.objects.push(Object::new(name, modified, stat.size.unwrap_or(0)));
            }
        }
        Ok(listing)
    }

    async fn exists(&self, relative_path: &str) -> Result<bool> {
        let absolute = self.absolute(relative_path)?;
        let client = self.connector.client().await?;
        run_blocking("check object existence", absolute.clone(), move || {
            match client.stat(Path::new(&absolute)) {
                Ok(_) => Ok(true),
                Err(err) if is_absent(&err) => Ok(false),
                Err(err) => Err(err).or_raise(|| ErrorKind::backend("check object existence", absolute)),
            }
        })
        .await
    }

    async fn read_object(&self, relative_path: &str) -> Result<BoxSyncRead> {
        let absolute = self.absolute(relative_path)?;
        let client = self.connector.client().await?;
        run_blocking("open object", absolute.clone(), move || {
            match client.open(Path::new(&absolute)) {
                Ok(file) => Ok(Box::new(BufReader::with_capacity(READ_BUFFER_SIZE, file)) as BoxSyncRead),
                Err(err) if is_absent(&err) => exn::bail!(ErrorKind::ObjectNotFound(absolute)),
                Err(err) => Err(err).or_raise(|| ErrorKind::backend("open object", absolute)),
            }
        })
        .await
    }

    async fn put_object(&self, name: &str, content: BoxSyncRead) -> Result<()> {
        let absolute = self.absolute(name)?;
        let client = self.connector.client().await?;
        let mut content = content;
        run_blocking("write object", absolute.clone(), move || {
            if let Some((parent, _)) = absolute.rsplit_once('/') {
                mkdir_all(&client, parent)?;
            }
            let mut file = client
                .create(Path::new(&absolute))
                .or_raise(|| ErrorKind::backend("create file", absolute.clone()))?;
            if let Err(err) = std::io::copy(&mut content, &mut file) {
                // Release the remote handle even though the write failed; the
                // write error is the one the caller needs to see.
                if let Err(close_err) = file.close() {
                    tracing::warn!(path = %absolute, error = %close_err, "failed to close file after failed write");
                }
                return Err(err).or_raise(|| ErrorKind::backend("write object", absolute));
            }
            file.close().or_raise(|| ErrorKind::backend("close file", absolute))
        })
        .await
    }

    async fn delete_objects(&self, relative_paths: &[&str]) -> Result<()> {
        let mut absolutes = Vec::with_capacity(relative_paths.len());
        for relative in relative_paths {
            absolutes.push(self.absolute(relative)?);
        }
        let client = self.connector.client().await?;
        run_blocking("delete objects", self.path.clone(), move || {
            for absolute in absolutes {
                let stat = match client.stat(Path::new(&absolute)) {
                    Ok(stat) => stat,
                    // Deleting an absent object is not an error.
                    Err(err) if is_absent(&err) => continue,
                    Err(err) => return Err(err).or_raise(|| ErrorKind::backend("stat object", absolute)),
                };
                // Directories may be non-empty; recursive removal is out of
                // contract, so skip them.
                if stat.is_dir() {
                    continue;
                }
                match client.unlink(Path::new(&absolute)) {
                    Ok(()) => {}
                    Err(err) if is_absent(&err) => {}
                    Err(err) => return Err(err).or_raise(|| ErrorKind::backend("delete object", absolute)),
                }
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_folder() -> FolderHandle {
        // Port 1 on loopback is essentially never listening; the dial fails
        // fast with connection refused.
        SftpFolder::configure(
            "127.0.0.1",
            Some(1),
            "backups",
            SftpCredentials {
                username: "walvault".to_string(),
                password: Some("secret".to_string()),
                private_key_path: None,
            },
        )
    }

    #[test]
    fn test_subfolder_derivation_is_pure() {
        let folder = unreachable_folder();
        assert_eq!(folder.path(), "backups/");
        let sub = folder.subfolder("basebackups_005");
        assert_eq!(sub.path(), "backups/basebackups_005/");
        // Deriving a sub-folder does not mutate the parent handle.
        assert_eq!(folder.path(), "backups/");
    }

    #[test]
    fn test_digest_identity() {
        let a = unreachable_folder();
        let b = unreachable_folder();
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), a.subfolder("other").digest());
    }

    #[tokio::test]
    async fn test_connection_failure_is_cached() {
        let folder = unreachable_folder();
        let first = folder.exists("anything").await.unwrap_err();
        assert!(matches!(&*first, ErrorKind::Connection(_)));
        // Second call observes the same cached failure without re-dialing.
        let second = folder.list().await.unwrap_err();
        assert!(matches!(&*second, ErrorKind::Connection(_)));
        assert_eq!(first.to_string(), second.to_string());
    }

    #[tokio::test]
    async fn test_invalid_relative_path() {
        let folder = unreachable_folder();
        let err = folder.exists("../escape").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }
}
