//! Append-only JSONL journal of workflow transitions.
//!
//! Every [`WorkflowLogEntry`] becomes one line:
//!
//! ```text
//! {"seq":3,"timestamp":"2026-03-01T12:00:00.000Z","coordination_id":"c1","status":"failed","type":"round_timeout","round":1,"settled":0,"agents":2}
//! ```
//!
//! `seq` restarts at 1 each time the journal is opened, so an appended file
//! shows where one run ends and the next begins.

use conclave_application::{WorkflowLogEntry, WorkflowLogEvent, WorkflowLogger};
use conclave_domain::{CoordinationId, WorkflowStatus};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

#[derive(Serialize)]
struct JournalLine<'a> {
    seq: u64,
    timestamp: String,
    coordination_id: Option<&'a CoordinationId>,
    status: WorkflowStatus,
    #[serde(flatten)]
    event: &'a WorkflowLogEvent,
}

struct Journal {
    writer: BufWriter<File>,
    seq: u64,
}

/// Workflow journal backed by a JSONL file.
pub struct JsonlWorkflowLogger {
    journal: Mutex<Journal>,
    path: PathBuf,
}

impl JsonlWorkflowLogger {
    /// Open the journal at `path` for appending, creating missing parent
    /// directories.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            journal: Mutex::new(Journal {
                writer: BufWriter::new(file),
                seq: 0,
            }),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &WorkflowLogEntry) -> io::Result<()> {
        let mut journal = self.journal.lock().unwrap_or_else(|e| e.into_inner());
        let line = JournalLine {
            seq: journal.seq + 1,
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            coordination_id: entry.coordination_id.as_ref(),
            status: entry.status,
            event: &entry.event,
        };
        serde_json::to_writer(&mut journal.writer, &line)?;
        journal.writer.write_all(b"\n")?;
        // Flushed per entry so a crashed run still leaves its last transition
        journal.writer.flush()?;
        journal.seq += 1;
        Ok(())
    }
}

impl WorkflowLogger for JsonlWorkflowLogger {
    fn log(&self, entry: WorkflowLogEntry) {
        if let Err(e) = self.append(&entry) {
            warn!(
                path = %self.path.display(),
                event = entry.event.kind(),
                error = %e,
                "Failed to write workflow journal"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn entry(status: WorkflowStatus, event: WorkflowLogEvent) -> WorkflowLogEntry {
        WorkflowLogEntry {
            coordination_id: Some(CoordinationId::new("c1")),
            status,
            event,
        }
    }

    #[test]
    fn test_entries_carry_workflow_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal").join("workflow.jsonl");
        let journal = JsonlWorkflowLogger::open(&path).unwrap();
        assert_eq!(journal.path(), path.as_path());

        journal.log(entry(
            WorkflowStatus::Consensus,
            WorkflowLogEvent::PlanAccepted {
                total_phases: 2,
                roster: 3,
            },
        ));
        journal.log(entry(
            WorkflowStatus::Failed,
            WorkflowLogEvent::RoundTimeout {
                round: 1,
                settled: 1,
                agents: 3,
            },
        ));
        drop(journal);

        let records = read_lines(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["seq"], 1);
        assert_eq!(records[0]["type"], "plan_accepted");
        assert_eq!(records[0]["coordination_id"], "c1");
        assert_eq!(records[0]["status"], "consensus");
        assert_eq!(records[0]["roster"], 3);
        assert_eq!(records[1]["seq"], 2);
        assert_eq!(records[1]["type"], "round_timeout");
        assert_eq!(records[1]["status"], "failed");
        assert!(records.iter().all(|r| r["timestamp"].is_string()));
    }

    #[test]
    fn test_reset_before_any_plan_has_null_coordination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflow.jsonl");
        let journal = JsonlWorkflowLogger::open(&path).unwrap();

        journal.log(WorkflowLogEntry {
            coordination_id: None,
            status: WorkflowStatus::Idle,
            event: WorkflowLogEvent::WorkflowReset,
        });
        drop(journal);

        let records = read_lines(&path);
        assert_eq!(records[0]["type"], "workflow_reset");
        assert!(records[0]["coordination_id"].is_null());
        assert_eq!(records[0]["status"], "idle");
    }

    #[test]
    fn test_reopen_appends_and_restarts_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workflow.jsonl");

        for _ in 0..2 {
            let journal = JsonlWorkflowLogger::open(&path).unwrap();
            journal.log(entry(
                WorkflowStatus::Completed,
                WorkflowLogEvent::ExecutionCompleted { agents: 2 },
            ));
        }

        let records = read_lines(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["seq"], 1);
        assert_eq!(records[1]["seq"], 1);
    }

    #[test]
    fn test_open_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        assert!(JsonlWorkflowLogger::open(blocker.join("workflow.jsonl")).is_err());
    }
}
