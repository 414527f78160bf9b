//! Reflog: one line per reference change.
//!
//! Line format:
//! `"<old-hex> <new-hex> <who> <timestamp> <tz>\t<message>\n"`,
//! with the null OID standing in for "no previous value". Reads tolerate a
//! missing file (empty log) and skip lines that do not parse.

use std::fs;
use std::io::Write;
use std::path::Path;

use vec_hash::ObjectId;
use vec_utils::date::Timestamp;

use crate::RefError;

/// One recorded reference change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflogEntry {
    pub old: ObjectId,
    pub new: ObjectId,
    /// Identity of whoever made the change, e.g. `"Jane <jane@example.com>"`.
    pub who: String,
    pub timestamp: i64,
    /// Timezone offset in minutes.
    pub tz_offset: i32,
    pub message: String,
}

impl ReflogEntry {
    /// Build an entry stamped with the current wall clock.
    pub fn now(old: ObjectId, new: ObjectId, who: &str, message: &str) -> Self {
        let ts = Timestamp::now();
        Self {
            old,
            new,
            who: who.to_string(),
            timestamp: ts.seconds,
            tz_offset: ts.tz_offset,
            message: message.to_string(),
        }
    }

    /// Render as a single log line (with trailing newline).
    fn to_line(&self) -> String {
        let ts = Timestamp::new(self.timestamp, self.tz_offset);
        format!(
            "{} {} {} {} {}\t{}\n",
            self.old.to_hex(),
            self.new.to_hex(),
            self.who,
            self.timestamp,
            ts.tz_string(),
            self.message
        )
    }

    /// Parse one log line. Returns `None` for lines that do not conform.
    fn parse_line(line: &str) -> Option<Self> {
        let (head, message) = line.split_once('\t')?;

        let mut fields = head.split(' ');
        let old = ObjectId::from_hex(fields.next()?).ok()?;
        let new = ObjectId::from_hex(fields.next()?).ok()?;

        // The identity may itself contain spaces; the last two fields are
        // always timestamp and tz.
        let rest: Vec<&str> = fields.collect();
        if rest.len() < 2 {
            return None;
        }
        let tz_str = rest[rest.len() - 1];
        let timestamp: i64 = rest[rest.len() - 2].parse().ok()?;
        let who = rest[..rest.len() - 2].join(" ");

        let tz_offset = parse_tz(tz_str)?;

        Some(Self {
            old,
            new,
            who,
            timestamp,
            tz_offset,
            message: message.to_string(),
        })
    }
}

fn parse_tz(s: &str) -> Option<i32> {
    if s.len() != 5 {
        return None;
    }
    let sign = match s.as_bytes()[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i32 = s[1..3].parse().ok()?;
    let mins: i32 = s[3..5].parse().ok()?;
    Some(sign * (hours * 60 + mins))
}

/// Append one entry to a log file, creating parent directories as needed.
pub fn append(log_path: &Path, entry: &ReflogEntry) -> Result<(), RefError> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    file.write_all(entry.to_line().as_bytes())?;
    Ok(())
}

/// Read a log file, oldest entry first. A missing file is an empty log.
pub fn read(log_path: &Path) -> Result<Vec<ReflogEntry>, RefError> {
    let content = match fs::read_to_string(log_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RefError::Io(e)),
    };

    Ok(content.lines().filter_map(ReflogEntry::parse_line).collect())
}
