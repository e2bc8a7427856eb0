use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use splitfund_core::{ExpectedVersion, GroupId};

use super::in_memory::InMemoryEventStore;
use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Event store backed by an append-only JSON Lines journal.
///
/// Every committed event is written as one line before it becomes visible in
/// memory; opening the store replays the journal. A torn final line (a write
/// cut short by a crash) is dropped and truncated away; any other unreadable
/// line is an error.
#[derive(Debug)]
pub struct FileEventStore {
    path: PathBuf,
    memory: InMemoryEventStore,
    journal: Mutex<Journal>,
}

/// Journal handle plus the length of its committed prefix.
///
/// Bytes past `committed_len` belong to a write that did not complete and
/// are cut off before the next append.
#[derive(Debug)]
struct Journal {
    file: File,
    committed_len: u64,
}

impl Journal {
    fn append(&mut self, buf: &[u8]) -> io::Result<()> {
        let actual = self.file.metadata()?.len();
        if actual != self.committed_len {
            tracing::warn!(
                committed = self.committed_len,
                actual,
                "discarding uncommitted journal bytes"
            );
            self.file.set_len(self.committed_len)?;
        }

        let written = self
            .file
            .write_all(buf)
            .and_then(|()| self.file.flush())
            .and_then(|()| self.file.sync_data());

        match written {
            Ok(()) => {
                self.committed_len += buf.len() as u64;
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = self.file.set_len(self.committed_len) {
                    tracing::error!(error = %rollback, "journal rollback failed; retrying on next append");
                }
                Err(e)
            }
        }
    }
}

impl FileEventStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EventStoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let memory = InMemoryEventStore::new();
        let replayed = replay(&path, &memory)?;

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let committed_len = file.metadata()?.len();
        tracing::info!(path = %path.display(), events = replayed, "event journal opened");

        Ok(Self {
            path,
            memory,
            journal: Mutex::new(Journal { file, committed_len }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Load every journal line into `memory`, returning the number of events.
fn replay(path: &Path, memory: &InMemoryEventStore) -> Result<usize, EventStoreError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut good_len: u64 = 0;
    let mut count = 0usize;
    let mut line_no = 0usize;

    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        line_no += 1;

        let complete = line.ends_with('\n');
        let text = line.trim();
        if text.is_empty() {
            good_len += read as u64;
            continue;
        }

        match (serde_json::from_str::<StoredEvent>(text), complete) {
            (Ok(event), _) => {
                memory.restore(event).map_err(|e| EventStoreError::Corrupt {
                    line: line_no,
                    reason: e.to_string(),
                })?;
                good_len += read as u64;
                count += 1;
                if !complete {
                    OpenOptions::new().append(true).open(path)?.write_all(b"\n")?;
                }
            }
            (Err(_), false) => {
                tracing::warn!(line = line_no, "dropping torn trailing journal line");
                OpenOptions::new().write(true).open(path)?.set_len(good_len)?;
                break;
            }
            (Err(e), true) => {
                return Err(EventStoreError::Corrupt {
                    line: line_no,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(count)
}

impl EventStore for FileEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.memory.append_with(events, expected_version, |committed| {
            let mut buf = Vec::new();
            for event in committed {
                serde_json::to_writer(&mut buf, event)
                    .map_err(|e| EventStoreError::InvalidAppend(format!("journal encoding failed: {e}")))?;
                buf.push(b'\n');
            }

            let mut journal = self
                .journal
                .lock()
                .map_err(|_| EventStoreError::InvalidAppend("journal lock poisoned".to_string()))?;
            journal.append(&buf)?;
            Ok(())
        })
    }

    fn load_stream(&self, stream_id: &GroupId) -> Result<Vec<StoredEvent>, EventStoreError> {
        self.memory.load_stream(stream_id)
    }

    fn stream_ids(&self) -> Result<Vec<GroupId>, EventStoreError> {
        self.memory.stream_ids()
    }
}
