//! Renders generated streams and reports onto a writer.

use std::io::Write;

use anyhow::{Context, Result};
use clap::ValueEnum;
use oee_sim_core::{EventStreams, OeeReport, Timestamp};
use oee_sim_pipeline::Request;
use serde::Serialize;

/// Payload layout written to stdout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// One document holding the `r`, `p` and `w` arrays.
    Json,
    /// One tagged event per line, ordered by timestamp.
    Jsonl,
    /// Human-readable comparison of targets and realized factors.
    Summary,
}

/// Encoding used for event timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum TimestampFormat {
    /// Integer milliseconds since the Unix epoch.
    Millis,
    /// RFC 3339 strings in UTC with millisecond precision.
    Rfc3339,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireTime {
    Millis(i64),
    Text(String),
}

impl WireTime {
    fn encode(timestamp: Timestamp, format: TimestampFormat) -> Self {
        match format {
            TimestampFormat::Millis => Self::Millis(timestamp.as_millis()),
            TimestampFormat::Rfc3339 => Self::Text(timestamp.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'static str>,
    t: WireTime,
    v: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    increase: Option<u32>,
}

#[derive(Debug, Serialize)]
struct WireStreams {
    r: Vec<WireEvent>,
    p: Vec<WireEvent>,
    w: Vec<WireEvent>,
}

/// Writes the three streams as a single JSON document.
pub(crate) fn write_json(
    out: &mut impl Write,
    streams: &EventStreams,
    timestamps: TimestampFormat,
) -> Result<()> {
    let document = WireStreams {
        r: streams
            .runtime
            .iter()
            .map(|event| WireEvent {
                tag: None,
                t: WireTime::encode(event.t, timestamps),
                v: u64::from(u8::from(event.v)),
                increase: None,
            })
            .collect(),
        p: streams
            .production
            .iter()
            .map(|event| WireEvent {
                tag: None,
                t: WireTime::encode(event.t, timestamps),
                v: event.v,
                increase: Some(event.increase),
            })
            .collect(),
        w: streams
            .waste
            .iter()
            .map(|event| WireEvent {
                tag: None,
                t: WireTime::encode(event.t, timestamps),
                v: u64::from(event.v),
                increase: None,
            })
            .collect(),
    };
    serde_json::to_writer(&mut *out, &document).context("failed to encode event streams")?;
    writeln!(out).context("failed to write event streams")
}

/// Writes every event as one tagged JSON object per line.
///
/// Events are merged across streams and stably sorted by timestamp, so ties
/// keep the running, counter, waste order.
pub(crate) fn write_jsonl(
    out: &mut impl Write,
    streams: &EventStreams,
    timestamps: TimestampFormat,
) -> Result<()> {
    let mut merged: Vec<(Timestamp, &'static str, u64)> = Vec::with_capacity(
        streams.runtime.len() + streams.production.len() + streams.waste.len(),
    );
    merged.extend(
        streams
            .runtime
            .iter()
            .map(|event| (event.t, "running", u64::from(u8::from(event.v)))),
    );
    merged.extend(
        streams
            .production
            .iter()
            .map(|event| (event.t, "counter", event.v)),
    );
    merged.extend(
        streams
            .waste
            .iter()
            .map(|event| (event.t, "waste", u64::from(event.v))),
    );
    merged.sort_by_key(|(t, _, _)| *t);

    for (t, tag, v) in merged {
        let line = WireEvent {
            tag: Some(tag),
            t: WireTime::encode(t, timestamps),
            v,
            increase: None,
        };
        serde_json::to_writer(&mut *out, &line).context("failed to encode event")?;
        writeln!(out).context("failed to write event")?;
    }
    Ok(())
}

/// Writes a table comparing requested targets with the realized factors.
pub(crate) fn write_summary(
    out: &mut impl Write,
    request: &Request,
    report: &OeeReport,
    seed: u64,
    timestamps: TimestampFormat,
) -> Result<()> {
    let window = request.window();
    let targets = request.targets();
    let target_oee =
        targets.availability().get() * targets.performance().get() * targets.quality().get();
    let render_time = |timestamp: Timestamp| match WireTime::encode(timestamp, timestamps) {
        WireTime::Millis(millis) => millis.to_string(),
        WireTime::Text(text) => text,
    };

    let mut table = String::new();
    table.push_str(&format!(
        "window        {} .. {} ({} ms)\n",
        render_time(window.start()),
        render_time(window.end()),
        report.duration_ms
    ));
    table.push_str(&format!("seed          {seed}\n"));
    table.push_str(&format!("segments      {}\n", report.segment_count));
    table.push_str(&format!("running       {} ms\n", report.running_ms));
    table.push_str(&format!("produced      {}\n", report.produced));
    table.push_str(&format!("wasted        {}\n", report.wasted));
    table.push('\n');
    table.push_str("factor        target    realized\n");
    for (name, target, realized) in [
        (
            "availability",
            targets.availability().get(),
            Some(report.availability),
        ),
        ("performance", targets.performance().get(), report.performance),
        ("quality", targets.quality().get(), report.quality),
        ("oee", target_oee, report.oee),
    ] {
        table.push_str(&format!(
            "{name:<14}{target:<10.4}{}\n",
            format_factor(realized)
        ));
    }

    out.write_all(table.as_bytes())
        .context("failed to write summary")
}

fn format_factor(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_owned(), |value| format!("{value:.4}"))
}
