use std::{fmt, str::FromStr};

use serde::Deserialize;
use strum::{AsRefStr, Display, EnumString};

use crate::{
    error::{Error, Result},
    operator,
};

/// Value the radio stack reports for an int field it does not know.
pub const UNKNOWN: i32 = i32::MAX;
/// Same as [`UNKNOWN`] for the 36 bit NR cell identity.
pub const UNKNOWN_LONG: i64 = i64::MAX;

pub const NOT_APPLICABLE: &str = "N/A";
pub const UNAVAILABLE: &str = "-1";
pub const UNAVAILABLE_DBM: i32 = -1;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Technology {
    #[strum(to_string = "GSM")]
    Gsm,
    #[strum(to_string = "WCDMA", serialize = "UMTS")]
    Wcdma,
    #[strum(to_string = "LTE")]
    Lte,
    #[strum(to_string = "NR")]
    Nr,
    #[strum(to_string = "CDMA")]
    Cdma,
}

impl Technology {
    pub fn parse(name: &str) -> Result<Self> {
        Self::from_str(name.trim()).map_err(|_| Error::UnsupportedTechnology(name.to_owned()))
    }
}

fn unknown() -> i32 {
    UNKNOWN
}

fn unknown_long() -> i64 {
    UNKNOWN_LONG
}

/// One cell as reported by the radio stack, before normalization.
///
/// Every numeric field may carry [`UNKNOWN`] (or [`UNKNOWN_LONG`]); a missing
/// field decodes as that sentinel too.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "radioType", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum RawReading {
    Gsm {
        #[serde(default = "unknown")]
        cid: i32,
        #[serde(default = "unknown")]
        lac: i32,
        #[serde(default)]
        mcc: Option<String>,
        #[serde(default)]
        mnc: Option<String>,
        #[serde(default = "unknown")]
        dbm: i32,
    },
    Wcdma {
        #[serde(default = "unknown")]
        cid: i32,
        #[serde(default = "unknown")]
        lac: i32,
        #[serde(default = "unknown")]
        psc: i32,
        #[serde(default)]
        mcc: Option<String>,
        #[serde(default)]
        mnc: Option<String>,
        #[serde(default = "unknown")]
        dbm: i32,
    },
    Lte {
        #[serde(default = "unknown")]
        ci: i32,
        #[serde(default = "unknown")]
        tac: i32,
        #[serde(default = "unknown")]
        pci: i32,
        #[serde(default = "unknown")]
        earfcn: i32,
        #[serde(default = "unknown")]
        bandwidth: i32,
        #[serde(default)]
        mcc: Option<String>,
        #[serde(default)]
        mnc: Option<String>,
        #[serde(default = "unknown")]
        dbm: i32,
    },
    Nr {
        #[serde(default = "unknown_long")]
        nci: i64,
        #[serde(default = "unknown")]
        tac: i32,
        #[serde(default = "unknown")]
        pci: i32,
        #[serde(default = "unknown")]
        nrarfcn: i32,
        #[serde(default)]
        mcc: Option<String>,
        #[serde(default)]
        mnc: Option<String>,
        #[serde(default = "unknown")]
        dbm: i32,
    },
    Cdma {
        #[serde(default = "unknown")]
        network_id: i32,
        #[serde(default = "unknown")]
        system_id: i32,
        #[serde(default = "unknown")]
        dbm: i32,
    },
}

impl RawReading {
    pub fn technology(&self) -> Technology {
        match self {
            RawReading::Gsm { .. } => Technology::Gsm,
            RawReading::Wcdma { .. } => Technology::Wcdma,
            RawReading::Lte { .. } => Technology::Lte,
            RawReading::Nr { .. } => Technology::Nr,
            RawReading::Cdma { .. } => Technology::Cdma,
        }
    }
}

/// A normalized cell reading, also the row type of the registry and the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellObservation {
    pub technology: Technology,
    pub cell_id: String,
    /// PCI for LTE and NR, PSC for WCDMA.
    pub secondary_id: Option<String>,
    pub area_code: String,
    pub mcc: String,
    pub mnc: String,
    pub signal_strength_dbm: i32,
    pub operator_name: String,
    pub channel: String,
    pub bandwidth: String,
    pub first_seen: String,
    pub last_seen: String,
}

fn known(value: i32) -> String {
    if value == UNKNOWN {
        UNAVAILABLE.to_owned()
    } else {
        value.to_string()
    }
}

fn known_dbm(value: i32) -> i32 {
    if value == UNKNOWN {
        UNAVAILABLE_DBM
    } else {
        value
    }
}

fn known_long(value: i64) -> String {
    if value == UNKNOWN_LONG {
        UNAVAILABLE.to_owned()
    } else {
        value.to_string()
    }
}

fn network_code(code: Option<&str>) -> String {
    match code.map(str::trim) {
        Some(x) if !x.is_empty() => x.to_owned(),
        _ => UNAVAILABLE.to_owned(),
    }
}

/// Turns a raw reading into a fully populated observation with empty
/// timestamps. Pure.
pub fn normalize(reading: &RawReading) -> CellObservation {
    let technology = reading.technology();
    let na = || NOT_APPLICABLE.to_owned();

    let (cell_id, secondary_id, area_code, mcc, mnc, channel, bandwidth, dbm) = match reading {
        RawReading::Gsm {
            cid,
            lac,
            mcc,
            mnc,
            dbm,
        } => (
            known(*cid),
            None,
            known(*lac),
            network_code(mcc.as_deref()),
            network_code(mnc.as_deref()),
            na(),
            na(),
            *dbm,
        ),
        RawReading::Wcdma {
            cid,
            lac,
            psc,
            mcc,
            mnc,
            dbm,
        } => (
            known(*cid),
            Some(known(*psc)),
            known(*lac),
            network_code(mcc.as_deref()),
            network_code(mnc.as_deref()),
            na(),
            na(),
            *dbm,
        ),
        RawReading::Lte {
            ci,
            tac,
            pci,
            earfcn,
            bandwidth,
            mcc,
            mnc,
            dbm,
        } => (
            known(*ci),
            Some(known(*pci)),
            known(*tac),
            network_code(mcc.as_deref()),
            network_code(mnc.as_deref()),
            known(*earfcn),
            known(*bandwidth),
            *dbm,
        ),
        RawReading::Nr {
            nci,
            tac,
            pci,
            nrarfcn,
            mcc,
            mnc,
            dbm,
        } => (
            known_long(*nci),
            Some(known(*pci)),
            known(*tac),
            network_code(mcc.as_deref()),
            network_code(mnc.as_deref()),
            known(*nrarfcn),
            na(),
            *dbm,
        ),
        // CDMA has no MCC/MNC, the network id stands in for the cell id
        RawReading::Cdma {
            network_id,
            system_id,
            dbm,
        } => (
            known(*network_id),
            None,
            known(*system_id),
            na(),
            na(),
            na(),
            na(),
            *dbm,
        ),
    };

    let operator_name = match technology {
        Technology::Cdma => operator::CDMA_OPERATOR.to_owned(),
        _ => operator::operator_name(&mcc, &mnc).to_owned(),
    };

    CellObservation {
        technology,
        cell_id,
        secondary_id,
        area_code,
        mcc,
        mnc,
        signal_strength_dbm: known_dbm(dbm),
        operator_name,
        channel,
        bandwidth,
        first_seen: String::new(),
        last_seen: String::new(),
    }
}

/// Composite key under which a physical cell is deduplicated.
///
/// Best effort: cells whose optional fields are all unavailable can collapse
/// onto the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellIdentity(String);

impl CellIdentity {
    pub fn of(observation: &CellObservation) -> Self {
        let secondary = match observation.technology {
            Technology::Lte | Technology::Nr | Technology::Wcdma => Some(
                observation
                    .secondary_id
                    .as_deref()
                    .unwrap_or(NOT_APPLICABLE),
            ),
            Technology::Gsm | Technology::Cdma => None,
        };

        let mut parts: Vec<&str> = vec![
            observation.technology.as_ref(),
            observation.cell_id.as_str(),
        ];
        parts.extend(secondary);
        parts.extend([
            observation.area_code.as_str(),
            observation.mcc.as_str(),
            observation.mnc.as_str(),
            observation.channel.as_str(),
        ]);
        Self(parts.join("_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
