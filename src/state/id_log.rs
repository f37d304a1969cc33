use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// A durable set of work-item ids
///
/// `insert` must not return until the id is durable; only then may
/// `contains` report it. Any store with write-then-acknowledge semantics
/// satisfies this.
pub trait DurableIdSet {
    /// Returns true if the id has been durably recorded
    fn contains(&self, id: u64) -> bool;

    /// Durably records the id
    fn insert(&mut self, id: u64) -> io::Result<()>;

    /// Number of distinct ids recorded
    fn len(&self) -> usize;

    /// Where the set is persisted, for error reports
    fn location(&self) -> PathBuf;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only newline-delimited id log, fully mirrored in memory
#[derive(Debug)]
pub struct IdLog {
    path: PathBuf,
    file: File,
    ids: HashSet<u64>,
}

impl IdLog {
    /// Opens (creating if needed) the log at `path` and loads every id in it
    ///
    /// Lines that do not parse as an id are skipped with a warning.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        let mut contents = String::new();
        BufReader::new(&file).read_to_string(&mut contents)?;

        // Every insert writes "<id>\n" in one call, so an unterminated tail is
        // a torn write and must not count as recorded.
        let (complete, torn) = match contents.rfind('\n') {
            Some(pos) => contents.split_at(pos + 1),
            None => ("", contents.as_str()),
        };

        let mut ids = HashSet::new();
        let mut skipped = 0usize;
        for line in complete.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match trimmed.parse::<u64>() {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(_) => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!(
                "Ignored {} unparseable line(s) in {}",
                skipped,
                path.display()
            );
        }

        if !torn.is_empty() {
            tracing::warn!(
                "Ignoring torn trailing entry {:?} in {}",
                torn,
                path.display()
            );
            file.set_len(complete.len() as u64)?;
            file.sync_data()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            ids,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All recorded ids, in no particular order
    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.ids.iter().copied()
    }
}

impl DurableIdSet for IdLog {
    fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    fn insert(&mut self, id: u64) -> io::Result<()> {
        self.file.write_all(format!("{}\n", id).as_bytes())?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.ids.insert(id);
        Ok(())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn location(&self) -> PathBuf {
        self.path.clone()
    }
}
