//! Network operator names for the mobile country / network codes we know about.

pub const UNKNOWN_OPERATOR: &str = "Unknown";
pub const CDMA_OPERATOR: &str = "CDMA Operator";

/// Looks up the carrier behind an (MCC, MNC) pair. Total: anything not in the
/// table is [`UNKNOWN_OPERATOR`].
pub fn operator_name(mcc: &str, mnc: &str) -> &'static str {
    match mcc {
        // Switzerland
        "228" => match mnc {
            "01" => "Swisscom",
            "02" | "07" | "08" | "12" | "60" => "Sunrise",
            "03" => "Salt",
            "05" | "09" => "Comfone",
            "06" => "SBB CFF FFS",
            "54" => "Lycamobile",
            _ => UNKNOWN_OPERATOR,
        },
        // France
        "208" => match mnc {
            "01" | "02" | "91" => "Orange",
            "08" | "09" | "10" | "11" | "13" => "SFR",
            "12" => "Truphone",
            "15" | "16" | "88" => "Free Mobile",
            "17" => "Legos",
            "20" | "21" | "35" => "Bouygues Telecom",
            "25" => "Lycamobile",
            _ => UNKNOWN_OPERATOR,
        },
        // Germany
        "262" => match mnc {
            "01" | "06" | "13" | "78" => "T-mobile",
            "02" | "04" | "09" => "Vodafone",
            "10" => "DB Netz",
            "12" | "22" => "sipgate",
            "03" | "05" | "07" | "08" | "11" | "16" | "17" | "20" => "Telefonica / O2",
            "14" => "Lebara",
            "21" => "Multiconnect",
            "23" => "1&1",
            "24" => "Telcovillage",
            "25" => "Mtel",
            "42" => "Truphone",
            "43" => "Lycamobile",
            _ => UNKNOWN_OPERATOR,
        },
        _ => UNKNOWN_OPERATOR,
    }
}
