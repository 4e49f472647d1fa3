//! Audit trail of token hand-offs and critical-section executions.
use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{RingError, Result};
use crate::registry::MemberId;

/// A successful hand-off of the token from one member to the next
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TransferEvent {
    pub from: MemberId,
    pub to: MemberId,
    pub hops: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum CriticalSectionPhase {
    Enter,
    Perform,
    Leave,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CriticalSectionEvent {
    pub member: MemberId,
    pub phase: CriticalSectionPhase,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum AuditEvent {
    Transfer(TransferEvent),
    CriticalSection(CriticalSectionEvent),
}

impl AuditEvent {
    pub fn transfer(from: MemberId, to: MemberId, hops: u64) -> Self {
        AuditEvent::Transfer(TransferEvent {
            from,
            to,
            hops,
            timestamp: Utc::now(),
        })
    }

    pub fn critical_section(member: MemberId, phase: CriticalSectionPhase) -> Self {
        AuditEvent::CriticalSection(CriticalSectionEvent {
            member,
            phase,
            timestamp: Utc::now(),
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AuditEvent::Transfer(event) => event.timestamp,
            AuditEvent::CriticalSection(event) => event.timestamp,
        }
    }
}

impl fmt::Display for CriticalSectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CriticalSectionPhase::Enter => write!(f, "entered"),
            CriticalSectionPhase::Perform => write!(f, "performed action in"),
            CriticalSectionPhase::Leave => write!(f, "left"),
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timestamp = self.timestamp().format("%Y/%m/%d %H:%M:%S%.3f");
        match self {
            AuditEvent::Transfer(event) => write!(
                f,
                "{} Member {} passed the token to member {} (hop {})",
                timestamp, event.from, event.to, event.hops
            ),
            AuditEvent::CriticalSection(event) => write!(
                f,
                "{} Member {} {} critical section",
                timestamp, event.member, event.phase
            ),
        }
    }
}

/// Write-only sink for audit records
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<()>;
}

/// Appends one human-readable line per event to a file
#[derive(Debug)]
pub struct FileAuditLog {
    path: PathBuf,
    // keeps lines from concurrent writers in this process whole
    writer: Mutex<()>,
}

impl FileAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditLog for FileAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        let _writer = self.writer.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| RingError::Audit(format!("cannot open {:?}: {}", self.path, e)))?;
        file.write_all(format!("{}\n", event).as_bytes())
            .await
            .map_err(|e| RingError::Audit(format!("cannot write {:?}: {}", self.path, e)))?;
        file.flush()
            .await
            .map_err(|e| RingError::Audit(format!("cannot flush {:?}: {}", self.path, e)))?;
        Ok(())
    }
}

/// Keeps events in memory; used by in-process rings and tests
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }

    pub async fn transfers(&self) -> Vec<TransferEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                AuditEvent::Transfer(transfer) => Some(transfer.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn critical_sections(&self) -> Vec<CriticalSectionEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                AuditEvent::CriticalSection(section) => Some(section.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
