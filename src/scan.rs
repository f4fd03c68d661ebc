use std::future::Future;

use log::warn;
use serde_json::Value;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, Lines},
    process::Command,
};

use crate::{
    error::{Error, Result},
    model::{RawReading, Technology},
};

pub trait ScanSource {
    /// Queries the radio once. `Ok(None)` means the source is exhausted and
    /// no further polls should be made.
    fn scan(&mut self) -> impl Future<Output = Result<Option<Vec<RawReading>>>>;
}

/// Decodes one batch. Readings of an unsupported technology or with broken
/// fields are skipped, the rest of the batch is kept.
pub fn decode_batch(data: &str) -> Result<Vec<RawReading>> {
    let value: Value =
        serde_json::from_str(data).map_err(|e| Error::Scan(format!("invalid batch: {e}")))?;
    let items = match value {
        Value::Array(x) => x,
        Value::Object(mut x) => match x.remove("cellTowers") {
            Some(Value::Array(x)) => x,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return Err(Error::Scan("cellTowers is not an array".to_owned())),
        },
        _ => return Err(Error::Scan("batch is not an array".to_owned())),
    };

    let mut readings = Vec::with_capacity(items.len());
    for item in items {
        match decode_reading(item) {
            Ok(x) => readings.push(x),
            Err(e) => warn!("skipping reading: {e}"),
        }
    }
    Ok(readings)
}

fn decode_reading(mut item: Value) -> Result<RawReading> {
    let name = item
        .get("radioType")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Scan("reading has no radioType".to_owned()))?;
    let technology = Technology::parse(name)?;

    // the tag is matched exactly, so hand serde the canonical spelling
    item["radioType"] = Value::String(technology.as_ref().to_lowercase());
    serde_json::from_value(item).map_err(|e| Error::Scan(format!("invalid {technology} reading: {e}")))
}

/// One batch per line, e.g. a replayed capture or a helper process piping
/// into stdin. Blank lines are ignored.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl<R: AsyncBufRead + Unpin> ScanSource for JsonLinesSource<R> {
    async fn scan(&mut self) -> Result<Option<Vec<RawReading>>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| Error::Scan(e.to_string()))?;
            match line {
                None => return Ok(None),
                Some(x) if x.trim().is_empty() => continue,
                Some(x) => return decode_batch(&x).map(Some),
            }
        }
    }
}

/// Runs a program once per poll and decodes its stdout as a single batch.
pub struct CommandSource {
    program: String,
    args: Vec<String>,
}

impl CommandSource {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl ScanSource for CommandSource {
    async fn scan(&mut self) -> Result<Option<Vec<RawReading>>> {
        // dropped on timeout, the child must not outlive the poll
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Scan(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Scan(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Some(Vec::new()));
        }
        decode_batch(&stdout).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_array_and_report() {
        let batch = decode_batch(
            r#"[{"radioType":"LTE","ci":500,"mcc":"228","mnc":"01"},
                {"radioType":"gsm","cid":42,"lac":9}]"#,
        )
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].technology(), Technology::Lte);
        assert_eq!(batch[1].technology(), Technology::Gsm);

        let batch =
            decode_batch(r#"{"timestamp":1,"cellTowers":[{"radioType":"umts","cid":1,"psc":7}]}"#)
                .unwrap();
        assert_eq!(batch[0].technology(), Technology::Wcdma);

        assert!(decode_batch(r#"{"wifiAccessPoints":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn unsupported_readings_are_skipped() {
        let batch = decode_batch(
            r#"[{"radioType":"tdscdma","cid":1},
                {"cid":2},
                {"radioType":"nr","nci":"not a number"},
                {"radioType":"nr","nci":68719476735,"pci":3}]"#,
        )
        .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].technology(), Technology::Nr);
    }

    #[test]
    fn broken_batch_is_an_error() {
        assert!(matches!(decode_batch("[{"), Err(Error::Scan(_))));
        assert!(matches!(decode_batch("42"), Err(Error::Scan(_))));
    }

    #[test]
    fn unknown_technology_error() {
        let item = serde_json::json!({"radioType": "iden"});
        assert!(matches!(
            decode_reading(item),
            Err(Error::UnsupportedTechnology(x)) if x == "iden"
        ));
    }

    #[tokio::test]
    async fn json_lines() {
        let input: &[u8] = b"[{\"radioType\":\"gsm\",\"cid\":1}]\n\n[]\n";
        let mut source = JsonLinesSource::new(input);
        assert_eq!(source.scan().await.unwrap().unwrap().len(), 1);
        assert_eq!(source.scan().await.unwrap().unwrap().len(), 0);
        assert!(source.scan().await.unwrap().is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command() {
        let mut source = CommandSource::new(
            "sh",
            vec![
                "-c".into(),
                r#"echo '[{"radioType":"cdma","networkId":4,"systemId":9}]'"#.into(),
            ],
        );
        let batch = source.scan().await.unwrap().unwrap();
        assert_eq!(batch[0].technology(), Technology::Cdma);

        let mut failing = CommandSource::new("sh", vec!["-c".into(), "exit 3".into()]);
        assert!(matches!(failing.scan().await, Err(Error::Scan(_))));
    }
}
