use std::{
    fs::{File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::debug;

use crate::models::Message;

const SAVE_FREQUENCY: usize = 20;

/// Picks `<dir>/<prefix>_messages_<timestamp>.json`, adding a counter when
/// the name is taken, and creates it holding an empty JSON array.
pub fn create_output_path(dir: &Path, prefix: &str) -> Result<PathBuf> {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let mut path = dir.join(format!("{}_messages_{}.json", prefix, timestamp));

    let mut counter = 0;
    while path.exists() {
        counter += 1;
        path = dir.join(format!("{}_messages_{}_({}).json", prefix, timestamp, counter));
    }

    File::create(&path)
        .and_then(|mut f| f.write_all(b"[\n]"))
        .with_context(|| format!("failed to create {}", path.display()))?;

    Ok(path)
}

/// Appends messages to a JSON array file, keeping the file a valid array
/// after every save.
pub fn save_messages(messages: &[Message], path: &Path) -> Result<()> {
    if messages.is_empty() {
        return Ok(());
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let file_size = file.metadata()?.len();

    if file_size <= 3 {
        file.set_len(0)?;
        file.write_all(b"[\n")?;
    } else {
        // Overwrite the closing "\n]".
        file.seek(SeekFrom::End(-2))?;
        file.write_all(b",\n")?;
    }

    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            file.write_all(b",\n")?;
        }
        let json = serde_json::to_string_pretty(message)?;
        file.write_all(json.as_bytes())?;
    }

    file.write_all(b"\n]")?;
    Ok(())
}

/// Buffers received messages and flushes them in batches.
#[derive(Debug)]
pub struct Transcript {
    path: PathBuf,
    pending: Vec<Message>,
    saved: usize,
}

impl Transcript {
    pub fn create(dir: &Path, prefix: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Self {
            path: create_output_path(dir, prefix)?,
            pending: Vec::new(),
            saved: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn saved(&self) -> usize {
        self.saved
    }

    pub fn push(&mut self, message: Message) -> Result<()> {
        self.pending.push(message);
        if self.pending.len() >= SAVE_FREQUENCY {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        save_messages(&self.pending, &self.path)?;
        self.saved += self.pending.len();
        debug!(saved = self.saved, path = %self.path.display(), "transcript flushed");
        self.pending.clear();
        Ok(())
    }
}
