use std::{fmt::Write, io};

use log::debug;

use crate::model::{CellObservation, NOT_APPLICABLE};

const COLUMNS: [&str; 12] = [
    "first seen",
    "last seen",
    "type",
    "CID",
    "PCI/PSC",
    "LAC",
    "MCC",
    "MNC",
    "dBm",
    "Operator",
    "EARFCN",
    "Bandwidth",
];

fn cells(observation: &CellObservation) -> [String; 12] {
    [
        observation.first_seen.clone(),
        observation.last_seen.clone(),
        observation.technology.to_string(),
        observation.cell_id.clone(),
        observation
            .secondary_id
            .clone()
            .unwrap_or_else(|| NOT_APPLICABLE.to_owned()),
        observation.area_code.clone(),
        observation.mcc.clone(),
        observation.mnc.clone(),
        observation.signal_strength_dbm.to_string(),
        observation.operator_name.clone(),
        observation.channel.clone(),
        observation.bandwidth.clone(),
    ]
}

/// Renders the registry as a left aligned text table, one line per cell.
pub fn render_table(observations: &[CellObservation]) -> String {
    let rows: Vec<_> = observations.iter().map(cells).collect();

    let mut widths = COLUMNS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut line = |values: &mut dyn Iterator<Item = &str>| {
        let text = values
            .zip(widths)
            .map(|(value, width)| format!("{value:<width$}"))
            .collect::<Vec<_>>()
            .join("  ");
        let _ = writeln!(out, "{}", text.trim_end());
    };

    line(&mut COLUMNS.iter().copied());
    for row in &rows {
        line(&mut row.iter().map(String::as_str));
    }
    out
}

/// Reprints the table after every poll until the first write error.
#[derive(Debug)]
pub struct LiveTable {
    clear: bool,
    enabled: bool,
}

impl LiveTable {
    pub fn new(clear: bool) -> Self {
        Self {
            clear,
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn show(&mut self, out: &mut impl io::Write, observations: &[CellObservation]) {
        if !self.enabled {
            return;
        }
        if let Err(e) = self.write(out, observations) {
            debug!("no longer printing cells: {e}");
            self.enabled = false;
        }
    }

    fn write(&self, out: &mut impl io::Write, observations: &[CellObservation]) -> io::Result<()> {
        if self.clear {
            write!(out, "\x1b[2J\x1b[H")?;
        }
        writeln!(out, "{}", render_table(observations))?;
        out.flush()
    }
}
