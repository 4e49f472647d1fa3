//! File-backed registry: one decimal member id per line.
//!
//! Every read-then-append runs under an exclusive `<registry>.lock` file so
//! that processes starting at the same time cannot claim the same id.
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{next_candidate, parse_entries, Member, MemberId, MembershipRegistry};
use crate::error::Result;
use crate::registry_error;

const LOCK_RETRY_DELAY: Duration = Duration::from_millis(10);
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_STALE_LOCK_AGE: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    // a lock file older than this was left behind by a crashed writer
    stale_lock_age: Duration,
    // serializes writers inside this process before touching the lock file
    writer: Mutex<()>,
}

/// Removes the lock file when the append is done
struct LockFileGuard {
    path: PathBuf,
}

impl Drop for LockFileGuard {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            warn!("Failed to release registry lock {:?}: {}", self.path, err);
        }
    }
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");
        Self {
            path,
            lock_path: PathBuf::from(lock_path),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            stale_lock_age: DEFAULT_STALE_LOCK_AGE,
            writer: Mutex::new(()),
        }
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn with_stale_lock_age(mut self, stale_lock_age: Duration) -> Self {
        self.stale_lock_age = stale_lock_age;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn acquire_lock(&self) -> Result<LockFileGuard> {
        let started = Instant::now();
        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.lock_path)
                .await
            {
                Ok(_) => {
                    return Ok(LockFileGuard {
                        path: self.lock_path.clone(),
                    })
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if self.lock_is_stale(&self.lock_path).await && self.break_stale_lock().await {
                        continue;
                    }
                    if started.elapsed() > self.lock_timeout {
                        return Err(registry_error!(
                            "timed out waiting for registry lock {:?}",
                            self.lock_path
                        ));
                    }
                    tokio::time::sleep(LOCK_RETRY_DELAY).await;
                }
                Err(err) => {
                    return Err(registry_error!(
                        "cannot create registry lock {:?}: {}",
                        self.lock_path,
                        err
                    ))
                }
            }
        }
    }

    async fn lock_is_stale(&self, path: &Path) -> bool {
        let Ok(metadata) = tokio::fs::metadata(path).await else {
            return false;
        };
        metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .map(|age| age >= self.stale_lock_age)
            .unwrap_or(false)
    }

    /// Move a stale lock out of the way. Returns whether the lock path is free.
    ///
    /// The rename is atomic, so of several processes breaking the same lock
    /// only one moves it. If what got moved turns out to be fresh, another
    /// process re-took the lock in between and it is put back.
    async fn break_stale_lock(&self) -> bool {
        let mut broken = self.lock_path.clone().into_os_string();
        broken.push(format!(".stale-{}-{}", std::process::id(), unique_suffix()));
        let broken = PathBuf::from(broken);

        match tokio::fs::rename(&self.lock_path, &broken).await {
            Ok(()) => {}
            // someone else broke it first
            Err(err) if err.kind() == ErrorKind::NotFound => return true,
            Err(err) => {
                warn!("Cannot break stale registry lock {:?}: {}", self.lock_path, err);
                return false;
            }
        }

        if !self.lock_is_stale(&broken).await {
            warn!("Registry lock {:?} was re-taken, restoring it", self.lock_path);
            if let Err(err) = tokio::fs::rename(&broken, &self.lock_path).await {
                warn!("Failed to restore registry lock {:?}: {}", self.lock_path, err);
            }
            return false;
        }

        warn!("Broke stale registry lock {:?}", self.lock_path);
        if let Err(err) = tokio::fs::remove_file(&broken).await {
            warn!("Failed to remove broken registry lock {:?}: {}", broken, err);
        }
        true
    }

    async fn read_contents(&self) -> Result<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(registry_error!("cannot read {:?}: {}", self.path, err)),
        }
    }

    /// Append `id` on its own line, terminating a hand-edited last line first
    async fn append(&self, id: MemberId, contents: &str) -> Result<()> {
        let mut line = String::new();
        if !contents.is_empty() && !contents.ends_with('\n') {
            line.push('\n');
        }
        line.push_str(&format!("{}\n", id));

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| registry_error!("cannot open {:?}: {}", self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| registry_error!("cannot append to {:?}: {}", self.path, e))?;
        file.flush()
            .await
            .map_err(|e| registry_error!("cannot flush {:?}: {}", self.path, e))?;
        Ok(())
    }

    async fn register_locked(&self, candidate: Option<MemberId>, base: MemberId) -> Result<Member> {
        let _writer = self.writer.lock().await;
        let _lock = self.acquire_lock().await?;

        let contents = self.read_contents().await?;
        let entries = parse_entries(&contents);
        let id = match candidate {
            Some(id) => id,
            None => next_candidate(&entries, base)?,
        };
        if let Some(join_order) = entries.iter().position(|member| *member == id) {
            debug!("[{}] Already registered at position {}", id, join_order);
            return Ok(Member {
                id,
                join_order,
                founder: false,
            });
        }
        self.append(id, &contents).await?;
        debug!("[{}] Registered at position {}", id, entries.len());
        Ok(Member {
            id,
            join_order: entries.len(),
            founder: entries.is_empty(),
        })
    }
}

fn unique_suffix() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default()
}

#[async_trait]
impl MembershipRegistry for FileRegistry {
    async fn register(&self, candidate: MemberId) -> Result<Member> {
        self.register_locked(Some(candidate), candidate).await
    }

    async fn register_next(&self, base: MemberId) -> Result<Member> {
        self.register_locked(None, base).await
    }

    async fn snapshot(&self) -> Result<Vec<MemberId>> {
        Ok(parse_entries(&self.read_contents().await?))
    }
}
