// SPDX-License-Identifier: MIT OR Apache-2.0
//! Waypoint headless player.
//!
//! Loads a walkthrough and plays it end to end, logging every effect.
//! Quizzes are answered automatically and background media is simulated.

mod driver;
mod media;
mod render;

use anyhow::Context as _;
use clap::Parser;
use driver::Driver;
use media::SimulatedMedia;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use waypoint_engine::{EngineConfig, ViewerSession, CONFIG_FILE_NAME};
use waypoint_model::{TimedTrigger, Walkthrough};

/// Extra playback after the last media quiz
const MEDIA_TAIL_SECS: f64 = 2.0;

#[derive(Parser, Debug)]
#[command(name = "waypoint-player", version)]
struct Cli {
    /// Walkthrough file (`.ron` or `.json`)
    walkthrough: PathBuf,

    /// Engine configuration (RON). Defaults to `waypoint.ron` if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Option index to pick for every quiz; the correct one if omitted
    #[arg(long)]
    answer: Option<usize>,

    /// Length of the simulated media in seconds
    #[arg(long)]
    media_length: Option<f64>,

    /// Seek the media to this position right after starting
    #[arg(long)]
    seek: Option<f64>,

    /// Only report problems with the walkthrough, don't play it
    #[arg(long, default_value_t = false)]
    check: bool,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(CONFIG_FILE_NAME);
            if !default.exists() {
                return Ok(EngineConfig::default());
            }
            default
        }
    };
    EngineConfig::load(&path).with_context(|| format!("loading config {}", path.display()))
}

/// Decode a walkthrough as written; JSON by extension, RON otherwise
fn parse_walkthrough(path: &Path, source: &str) -> anyhow::Result<Walkthrough> {
    let walkthrough = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Walkthrough::parse_json(source),
        _ => Walkthrough::parse_ron(source),
    }
    .with_context(|| format!("parsing {}", path.display()))?;
    Ok(walkthrough)
}

async fn load_walkthrough(path: &Path) -> anyhow::Result<Walkthrough> {
    let source = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    parse_walkthrough(path, &source)
}

/// Log every violation and fail if there was any
fn check_walkthrough(walkthrough: &Walkthrough) -> anyhow::Result<()> {
    let violations = walkthrough.check();
    if violations.is_empty() {
        tracing::info!("'{}' is valid ({} steps)", walkthrough.title, walkthrough.len());
        return Ok(());
    }
    for violation in &violations {
        tracing::warn!("{:?}", violation);
    }
    anyhow::bail!("'{}' has {} problem(s)", walkthrough.title, violations.len());
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("waypoint_player=info".parse()?)
        .add_directive("waypoint_engine=debug".parse()?);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Waypoint Player v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;
    let mut walkthrough = load_walkthrough(&cli.walkthrough).await?;
    if cli.check {
        return check_walkthrough(&walkthrough);
    }
    let repairs = walkthrough.normalize();
    if repairs > 0 {
        tracing::info!("Repaired {} problem(s) before playing", repairs);
    }

    let dispatcher = render::console_dispatcher(cli.answer);
    let poll = config.timeline_poll();
    let last_quiz = walkthrough
        .media_triggers()
        .iter()
        .map(TimedTrigger::timestamp)
        .reduce(f64::max);

    let (session, media) = match last_quiz {
        Some(last) => {
            let length = cli.media_length.unwrap_or(last + MEDIA_TAIL_SECS);
            let media = SimulatedMedia::new(length);
            tracing::info!("Simulating {:.1}s of media", length);
            let session = ViewerSession::with_media(walkthrough, dispatcher, Box::new(media.clone()), &config);
            (session, Some(media))
        }
        None => (ViewerSession::new(walkthrough, dispatcher, &config), None),
    };

    Driver::new(session, media, poll)
        .with_initial_seek(cli.seek)
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOUR: &str = include_str!("../../../demos/tour.json");

    #[test]
    fn test_demo_tour_passes_check() {
        let walkthrough = parse_walkthrough(Path::new("tour.json"), TOUR).unwrap();
        assert_eq!(walkthrough.len(), 4);
        assert_eq!(walkthrough.media_triggers().len(), 1);
        assert!(check_walkthrough(&walkthrough).is_ok());
    }

    #[test]
    fn test_check_reports_broken_sequence() {
        let mut json: serde_json::Value = serde_json::from_str(TOUR).unwrap();
        json["sequence"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!("a1f3c0de-0009-4000-8000-000000000009"));
        let walkthrough = parse_walkthrough(Path::new("broken.json"), &json.to_string()).unwrap();

        let err = check_walkthrough(&walkthrough).unwrap_err();
        assert!(err.to_string().contains("1 problem"));
    }

    #[test]
    fn test_non_json_extension_parses_as_ron() {
        let walkthrough = Walkthrough::new("Empty");
        let ron = walkthrough.to_ron().unwrap();
        let parsed = parse_walkthrough(Path::new("empty.ron"), &ron).unwrap();
        assert_eq!(parsed.title, "Empty");
        assert!(parse_walkthrough(Path::new("empty.json"), &ron).is_err());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "waypoint-player",
            "tour.json",
            "--answer",
            "1",
            "--seek",
            "4.5",
            "--check",
        ])
        .unwrap();
        assert_eq!(cli.answer, Some(1));
        assert_eq!(cli.seek, Some(4.5));
        assert!(cli.check);
    }
}
