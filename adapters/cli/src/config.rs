//! Scenario files and the flag overrides layered on top of them.

use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use oee_sim_core::Timestamp;
use oee_sim_pipeline::{GeneratorConfig, Request};
use oee_sim_system_runtimes::{Config as RuntimesConfig, RemainderPolicy};
use oee_sim_system_waste::Config as WasteConfig;
use serde::Deserialize;

const SUPPORTED_SCENARIO_VERSION: u32 = 1;

const DEFAULT_DURATION_SECS: u64 = 3_600;
const DEFAULT_RATIO: f64 = 1.0;
const DEFAULT_HOURLY_TARGET: f64 = 60.0;

/// Window bounds; `end` and `duration_secs` are alternatives.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct WindowTable {
    pub(crate) start: Option<String>,
    pub(crate) end: Option<String>,
    pub(crate) duration_secs: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TargetsTable {
    pub(crate) availability: Option<f64>,
    pub(crate) performance: Option<f64>,
    pub(crate) quality: Option<f64>,
    pub(crate) hourly_target: Option<f64>,
    pub(crate) counter_start: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct GeneratorTable {
    pub(crate) seed: Option<u64>,
    pub(crate) discard_remainder: Option<bool>,
    pub(crate) jitter_ms: Option<u32>,
}

/// One layer of scenario settings, either read from a file or built from flags.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Scenario {
    pub(crate) window: WindowTable,
    pub(crate) targets: TargetsTable,
    pub(crate) generator: GeneratorTable,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Manifest {
    version: u32,
    #[serde(default)]
    window: WindowTable,
    #[serde(default)]
    targets: TargetsTable,
    #[serde(default)]
    generator: GeneratorTable,
}

/// Fully resolved inputs for one generation run.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Settings {
    pub(crate) request: Request,
    pub(crate) generator: GeneratorConfig,
    pub(crate) seed: Option<u64>,
}

/// Reads and validates the scenario file at `path`.
pub(crate) fn load_scenario(path: &Path) -> Result<Scenario> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario file at {}", path.display()))?;
    parse_scenario(&contents)
        .with_context(|| format!("invalid scenario file at {}", path.display()))
}

fn parse_scenario(contents: &str) -> Result<Scenario> {
    let manifest: Manifest =
        toml::from_str(contents).context("failed to parse scenario toml contents")?;
    if manifest.version != SUPPORTED_SCENARIO_VERSION {
        bail!(
            "unsupported scenario version {}; expected {}",
            manifest.version,
            SUPPORTED_SCENARIO_VERSION
        );
    }
    Ok(Scenario {
        window: manifest.window,
        targets: manifest.targets,
        generator: manifest.generator,
    })
}

impl Scenario {
    /// Layers `overrides` on top of `self`; any value set in `overrides` wins.
    ///
    /// An end or duration in `overrides` replaces both bounds of `self`, since
    /// they describe the same edge of the window.
    #[must_use]
    pub(crate) fn overlay(self, overrides: Scenario) -> Scenario {
        let (end, duration_secs) =
            if overrides.window.end.is_some() || overrides.window.duration_secs.is_some() {
                (overrides.window.end, overrides.window.duration_secs)
            } else {
                (self.window.end, self.window.duration_secs)
            };

        Scenario {
            window: WindowTable {
                start: overrides.window.start.or(self.window.start),
                end,
                duration_secs,
            },
            targets: TargetsTable {
                availability: overrides.targets.availability.or(self.targets.availability),
                performance: overrides.targets.performance.or(self.targets.performance),
                quality: overrides.targets.quality.or(self.targets.quality),
                hourly_target: overrides.targets.hourly_target.or(self.targets.hourly_target),
                counter_start: overrides.targets.counter_start.or(self.targets.counter_start),
            },
            generator: GeneratorTable {
                seed: overrides.generator.seed.or(self.generator.seed),
                discard_remainder: overrides
                    .generator
                    .discard_remainder
                    .or(self.generator.discard_remainder),
                jitter_ms: overrides.generator.jitter_ms.or(self.generator.jitter_ms),
            },
        }
    }

    /// Fills in defaults and validates the request; windows without an end close at `now`.
    pub(crate) fn resolve(self, now: DateTime<Utc>) -> Result<Settings> {
        let (start, end) = resolve_window(&self.window, now)?;
        let targets = &self.targets;
        let request = Request::new(
            start,
            end,
            targets.availability.unwrap_or(DEFAULT_RATIO),
            targets.performance.unwrap_or(DEFAULT_RATIO),
            targets.quality.unwrap_or(DEFAULT_RATIO),
            targets.hourly_target.unwrap_or(DEFAULT_HOURLY_TARGET),
        )
        .context("invalid generation request")?
        .with_counter_start(targets.counter_start.unwrap_or(0));

        let remainder = if self.generator.discard_remainder.unwrap_or(false) {
            RemainderPolicy::Discard
        } else {
            RemainderPolicy::Absorb
        };
        let waste = self
            .generator
            .jitter_ms
            .map(WasteConfig::new)
            .unwrap_or_default();

        Ok(Settings {
            request,
            generator: GeneratorConfig {
                runtimes: RuntimesConfig::new(remainder),
                waste,
            },
            seed: self.generator.seed,
        })
    }
}

fn resolve_window(window: &WindowTable, now: DateTime<Utc>) -> Result<(Timestamp, Timestamp)> {
    if window.end.is_some() && window.duration_secs.is_some() {
        bail!("window end and duration are mutually exclusive");
    }

    let start = window.start.as_deref().map(parse_instant).transpose()?;
    let end = window.end.as_deref().map(parse_instant).transpose()?;
    let duration_ms = window
        .duration_secs
        .unwrap_or(DEFAULT_DURATION_SECS)
        .checked_mul(1_000)
        .and_then(|millis| i64::try_from(millis).ok())
        .context("window duration is too large")?;

    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        (Some(start), None) => {
            let end = start
                .as_millis()
                .checked_add(duration_ms)
                .context("window end overflows the timestamp range")?;
            Ok((start, Timestamp::from_millis(end)))
        }
        (None, end) => {
            let end = end.unwrap_or_else(|| Timestamp::from(now));
            let start = end
                .as_millis()
                .checked_sub(duration_ms)
                .context("window start underflows the timestamp range")?;
            Ok((Timestamp::from_millis(start), end))
        }
    }
}

/// Parses an RFC 3339 instant or a whole number of epoch milliseconds.
fn parse_instant(value: &str) -> Result<Timestamp> {
    if let Ok(millis) = value.parse::<i64>() {
        return Ok(Timestamp::from_millis(millis));
    }
    let datetime = DateTime::parse_from_rfc3339(value).with_context(|| {
        format!("invalid timestamp `{value}`; expected RFC 3339 or epoch milliseconds")
    })?;
    Ok(Timestamp::from(datetime.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn parse_scenario_reads_every_table() {
        let scenario = parse_scenario(
            r#"
            version = 1

            [window]
            start = "2024-05-01T06:00:00Z"
            duration_secs = 28800

            [targets]
            availability = 0.85
            hourly_target = 120.0
            counter_start = 1000

            [generator]
            seed = 7
            jitter_ms = 0
        "#,
        )
        .expect("valid scenario");

        assert_eq!(scenario.window.duration_secs, Some(28_800));
        assert_eq!(scenario.targets.availability, Some(0.85));
        assert_eq!(scenario.targets.quality, None);
        assert_eq!(scenario.generator.seed, Some(7));
    }

    #[test]
    fn parse_scenario_rejects_unknown_versions() {
        let error = parse_scenario("version = 2").expect_err("version mismatch");
        assert!(error.to_string().contains("unsupported scenario version 2"));
    }

    #[test]
    fn parse_scenario_requires_version() {
        assert!(parse_scenario("[targets]\nquality = 0.9").is_err());
    }

    #[test]
    fn parse_scenario_rejects_unknown_keys() {
        assert!(parse_scenario("version = 1\n[targets]\nqualty = 0.9").is_err());
    }

    #[test]
    fn overrides_take_precedence() {
        let file = Scenario {
            window: WindowTable {
                start: Some("0".to_owned()),
                end: Some("7200000".to_owned()),
                duration_secs: None,
            },
            targets: TargetsTable {
                availability: Some(0.5),
                quality: Some(0.9),
                ..TargetsTable::default()
            },
            generator: GeneratorTable::default(),
        };
        let flags = Scenario {
            window: WindowTable {
                duration_secs: Some(60),
                ..WindowTable::default()
            },
            targets: TargetsTable {
                availability: Some(0.75),
                ..TargetsTable::default()
            },
            generator: GeneratorTable::default(),
        };

        let merged = file.overlay(flags);
        assert_eq!(merged.window.start.as_deref(), Some("0"));
        assert_eq!(merged.window.end, None);
        assert_eq!(merged.window.duration_secs, Some(60));
        assert_eq!(merged.targets.availability, Some(0.75));
        assert_eq!(merged.targets.quality, Some(0.9));
    }

    #[test]
    fn defaults_cover_the_last_hour() {
        let settings = Scenario::default().resolve(now()).expect("defaults are valid");
        let window = settings.request.window();
        assert_eq!(window.end(), Timestamp::from(now()));
        assert_eq!(window.duration_ms(), 3_600_000);
        assert_eq!(settings.request.targets().hourly_target(), 60.0);
        assert_eq!(settings.request.counter_start(), 0);
        assert_eq!(settings.generator, GeneratorConfig::default());
        assert_eq!(settings.seed, None);
    }

    #[test]
    fn start_with_duration_extends_forward() {
        let scenario = Scenario {
            window: WindowTable {
                start: Some("2024-05-01T06:00:00Z".to_owned()),
                end: None,
                duration_secs: Some(600),
            },
            ..Scenario::default()
        };
        let settings = scenario.resolve(now()).expect("valid window");
        let window = settings.request.window();
        assert_eq!(window.start().to_rfc3339(), "2024-05-01T06:00:00.000Z");
        assert_eq!(window.end().to_rfc3339(), "2024-05-01T06:10:00.000Z");
    }

    #[test]
    fn end_and_duration_conflict() {
        let scenario = Scenario {
            window: WindowTable {
                start: None,
                end: Some("1000".to_owned()),
                duration_secs: Some(1),
            },
            ..Scenario::default()
        };
        assert!(scenario.resolve(now()).is_err());
    }

    #[test]
    fn invalid_targets_surface_generation_errors() {
        let scenario = Scenario {
            targets: TargetsTable {
                quality: Some(1.5),
                ..TargetsTable::default()
            },
            ..Scenario::default()
        };
        let error = scenario.resolve(now()).expect_err("quality out of range");
        assert!(format!("{error:#}").contains("quality"));
    }

    #[test]
    fn generator_table_selects_stage_tuning() {
        let scenario = Scenario {
            generator: GeneratorTable {
                seed: Some(3),
                discard_remainder: Some(true),
                jitter_ms: Some(250),
            },
            ..Scenario::default()
        };
        let settings = scenario.resolve(now()).expect("valid scenario");
        assert_eq!(
            settings.generator.runtimes.remainder(),
            RemainderPolicy::Discard
        );
        assert_eq!(settings.generator.waste.jitter_ms(), 250);
        assert_eq!(settings.seed, Some(3));
    }

    #[test]
    fn instants_accept_rfc3339_and_millis() {
        assert_eq!(
            parse_instant("1714564800000").expect("millis"),
            Timestamp::from_millis(1_714_564_800_000)
        );
        assert_eq!(
            parse_instant("2024-05-01T14:00:00+02:00").expect("rfc3339"),
            Timestamp::from(now())
        );
        assert!(parse_instant("yesterday").is_err());
    }
}
