//! Tool-loop audit trail
//!
//! Every tool-loop run is stored with a SHA-256 digest of its capability
//! calls so a record can later be checked for tampering. The log is a
//! bounded ring: once full, the oldest run is dropped.

use crate::models::ToolCallRecord;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use crate::config::DEFAULT_AUDIT_CAPACITY;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoopAuditRecord {
    pub audit_id: Uuid,
    pub session_id: Option<Uuid>,
    pub persona: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub steps: usize,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
    pub digest: String,
}

impl LoopAuditRecord {
    pub fn new(
        session_id: Option<Uuid>,
        persona: impl Into<String>,
        tool_calls: Vec<ToolCallRecord>,
        steps: usize,
        duration_ms: u64,
    ) -> Self {
        let digest = compute_calls_digest(&tool_calls);
        Self {
            audit_id: Uuid::new_v4(),
            session_id,
            persona: persona.into(),
            tool_calls,
            steps,
            duration_ms,
            created_at: Utc::now(),
            digest,
        }
    }
}

/// Audit trail storage
pub struct AuditLog {
    records: Arc<RwLock<VecDeque<LoopAuditRecord>>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    /// Store a run record, dropping the oldest when full
    pub async fn record(&self, record: LoopAuditRecord) -> Result<Uuid> {
        let audit_id = record.audit_id;
        let mut records = self.records.write().await;
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
        Ok(audit_id)
    }

    pub async fn get(&self, audit_id: Uuid) -> Result<Option<LoopAuditRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.audit_id == audit_id).cloned())
    }

    /// Records of one session, oldest first
    pub async fn list_for_session(&self, session_id: Uuid) -> Result<Vec<LoopAuditRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|record| record.session_id == Some(session_id))
            .cloned()
            .collect())
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Recompute the digest of a stored record
    pub async fn verify_integrity(&self, audit_id: Uuid) -> Result<bool> {
        let records = self.records.read().await;

        match records.iter().find(|r| r.audit_id == audit_id) {
            Some(record) => Ok(compute_calls_digest(&record.tool_calls) == record.digest),
            None => Ok(false),
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// SHA-256 over the JSON form of the calls, streamed into the hasher
pub fn compute_calls_digest(calls: &[ToolCallRecord]) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), calls).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ToolOutput;
    use serde_json::json;

    fn call(name: &str) -> ToolCallRecord {
        ToolCallRecord {
            capability: name.to_string(),
            arguments: json!({"token": "SOL"}),
            result: ToolOutput::ok(json!({"usd": 150.0}), "ok"),
            duration_ms: 3,
        }
    }

    #[tokio::test]
    async fn test_record_and_verify() {
        let log = AuditLog::new();
        let session = Uuid::new_v4();
        let id = log
            .record(LoopAuditRecord::new(Some(session), "solpilot", vec![call("price_lookup")], 2, 10))
            .await
            .unwrap();

        assert!(log.verify_integrity(id).await.unwrap());
        let listed = log.list_for_session(session).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].audit_id, id);
        assert!(!log.verify_integrity(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_tampered_record_fails_verification() {
        let log = AuditLog::new();
        let mut record = LoopAuditRecord::new(None, "sonia", vec![call("price_lookup")], 1, 5);
        record.tool_calls.push(call("balance_lookup"));
        let id = log.record(record).await.unwrap();

        assert!(!log.verify_integrity(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_full_log_drops_oldest_run() {
        let log = AuditLog::with_capacity(2);
        let session = Uuid::new_v4();
        let mut ids = Vec::new();
        for steps in 1..=3 {
            let record = LoopAuditRecord::new(Some(session), "solpilot", vec![], steps, 1);
            ids.push(log.record(record).await.unwrap());
        }

        assert_eq!(log.len().await, 2);
        assert!(log.get(ids[0]).await.unwrap().is_none());
        let steps: Vec<usize> = log
            .list_for_session(session)
            .await
            .unwrap()
            .iter()
            .map(|r| r.steps)
            .collect();
        assert_eq!(steps, vec![2, 3]);
    }

    #[test]
    fn test_digest_is_stable() {
        let calls = vec![call("price_lookup")];
        assert_eq!(compute_calls_digest(&calls), compute_calls_digest(&calls));
        assert_eq!(compute_calls_digest(&calls).len(), 64);
    }
}
