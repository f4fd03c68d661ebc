//! The CSV log of one recording session.

use std::{
    collections::HashMap,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, FixedOffset};

use crate::{
    error::{Error, Result},
    model::{CellIdentity, CellObservation},
    timestamp::format_file_stamp,
};

pub const HEADER: &str =
    "first seen, last seen, type, CID, LAC, MCC, MNC, dBm, Operator, EARFCN, Bandwidth";
pub const SEPARATOR: &str = ", ";
pub const FILE_PREFIX: &str = "cell_log_";
pub const FILE_EXTENSION: &str = "csv";

/// Values come from a controlled vocabulary and never contain the separator,
/// but a stray comma would shift every following column.
fn field(value: &str) -> String {
    value.replace([',', '\n', '\r'], ";")
}

pub fn format_row(observation: &CellObservation) -> String {
    let dbm = observation.signal_strength_dbm.to_string();
    let fields: [&str; 11] = [
        observation.first_seen.as_str(),
        observation.last_seen.as_str(),
        observation.technology.as_ref(),
        observation.cell_id.as_str(),
        observation.area_code.as_str(),
        observation.mcc.as_str(),
        observation.mnc.as_str(),
        dbm.as_str(),
        observation.operator_name.as_str(),
        observation.channel.as_str(),
        observation.bandwidth.as_str(),
    ];
    fields
        .iter()
        .map(|x| field(x))
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

#[derive(Debug)]
pub struct SessionLog {
    path: PathBuf,
    rows: Vec<String>,
    index: HashMap<CellIdentity, usize>,
}

impl SessionLog {
    /// Creates `dir` if needed and a fresh log file in it named after
    /// `started`. Two sessions started within the same second get a numeric
    /// suffix instead of sharing a file.
    pub fn create(dir: &Path, started: &DateTime<FixedOffset>) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| Error::log_io(dir, e))?;

        let stem = format!("{FILE_PREFIX}{}", format_file_stamp(started));
        let mut attempt = 0;
        loop {
            let name = match attempt {
                0 => format!("{stem}.{FILE_EXTENSION}"),
                n => format!("{stem}_{n}.{FILE_EXTENSION}"),
            };
            let path = dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    writeln!(file, "{HEADER}").map_err(|e| Error::log_io(&path, e))?;
                    return Ok(Self {
                        path,
                        rows: Vec::new(),
                        index: HashMap::new(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(Error::log_io(&path, e)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of data rows, header excluded.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Appends a row for a cell not logged yet. An identity that already has
    /// a row is rewritten instead.
    ///
    /// The row is kept in memory even when the write fails, the next rewrite
    /// puts it back on disk.
    pub fn append(&mut self, identity: &CellIdentity, observation: &CellObservation) -> Result<()> {
        if self.index.contains_key(identity) {
            return self.update(identity, observation);
        }

        let row = format_row(observation);
        self.index.insert(identity.clone(), self.rows.len());
        self.rows.push(row.clone());

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::log_io(&self.path, e))?;
        writeln!(file, "{row}").map_err(|e| Error::log_io(&self.path, e))
    }

    /// Replaces the row of `identity` and rewrites the whole file. O(rows)
    /// per call, fine for the tens of cells a session sees.
    pub fn update(&mut self, identity: &CellIdentity, observation: &CellObservation) -> Result<()> {
        let Some(&i) = self.index.get(identity) else {
            return self.append(identity, observation);
        };
        self.rows[i] = format_row(observation);
        self.rewrite()
    }

    fn rewrite(&self) -> Result<()> {
        let mut data = String::with_capacity((self.rows.len() + 1) * 96);
        data.push_str(HEADER);
        data.push('\n');
        for row in &self.rows {
            data.push_str(row);
            data.push('\n');
        }
        fs::write(&self.path, data).map_err(|e| Error::log_io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{normalize, RawReading};

    fn started() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-06-05T07:08:09+02:00").unwrap()
    }

    fn lte(ci: i32, tac: i32) -> CellObservation {
        let mut obs = normalize(&RawReading::Lte {
            ci,
            tac,
            pci: 1,
            earfcn: 1300,
            bandwidth: 20_000,
            mcc: Some("228".into()),
            mnc: Some("01".into()),
            dbm: -90,
        });
        obs.first_seen = "05.06.2024 07:08:09 UTC+02:00".into();
        obs.last_seen = obs.first_seen.clone();
        obs
    }

    #[test]
    fn header_and_row_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::create(dir.path(), &started()).unwrap();
        assert_eq!(
            log.path().file_name().unwrap(),
            "cell_log_05.06.2024_07-08-09.csv"
        );

        for ci in 1..=3 {
            let obs = lte(ci, 7);
            log.append(&CellIdentity::of(&obs), &obs).unwrap();
        }

        assert_eq!(log.len(), 3);
        let data = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = data.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "first seen, last seen, type, CID, LAC, MCC, MNC, dBm, Operator, EARFCN, Bandwidth"
        );
        assert_eq!(
            lines[1],
            "05.06.2024 07:08:09 UTC+02:00, 05.06.2024 07:08:09 UTC+02:00, LTE, 1, 7, 228, 01, -90, Swisscom, 1300, 20000"
        );
    }

    #[test]
    fn update_keeps_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = SessionLog::create(dir.path(), &started()).unwrap();
        let a = lte(1, 7);
        let b = lte(2, 7);
        log.append(&CellIdentity::of(&a), &a).unwrap();
        log.append(&CellIdentity::of(&b), &b).unwrap();

        let mut a2 = a.clone();
        a2.signal_strength_dbm = -70;
        log.update(&CellIdentity::of(&a), &a2).unwrap();

        let data = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = data.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains(", 1, 7, ") && lines[1].contains(", -70, "));
        assert!(lines[2].contains(", 2, 7, ") && lines[2].contains(", -90, "));
    }

    #[test]
    fn same_second_sessions_do_not_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = SessionLog::create(dir.path(), &started()).unwrap();
        let second = SessionLog::create(dir.path(), &started()).unwrap();
        assert_ne!(first.path(), second.path());
        assert_eq!(
            second.path().file_name().unwrap(),
            "cell_log_05.06.2024_07-08-09_1.csv"
        );
    }

    #[test]
    fn commas_cannot_shift_columns() {
        let mut obs = lte(1, 7);
        obs.operator_name = "Foo, Inc".into();
        let row = format_row(&obs);
        assert_eq!(row.split(SEPARATOR).count(), 11);
    }
}
