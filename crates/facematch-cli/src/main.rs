use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

#[zbus::proxy(
    interface = "org.freedesktop.FaceMatch1",
    default_service = "org.freedesktop.FaceMatch1",
    default_path = "/org/freedesktop/FaceMatch1"
)]
trait FaceMatch {
    async fn enroll(&self, name: &str, image: &str) -> zbus::Result<i64>;
    async fn recognize(&self, image: &str, threshold: f64) -> zbus::Result<String>;
    async fn list_identities(&self) -> zbus::Result<String>;
    async fn history(&self, limit: u32) -> zbus::Result<String>;
    async fn remove_identity(&self, id: i64) -> zbus::Result<bool>;
    async fn status(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "facematch", about = "facematch face enrollment and recognition CLI")]
struct Cli {
    /// Talk to a daemon on the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll the single face in an image
    Enroll {
        /// Name to enroll the face under
        #[arg(short, long)]
        name: String,
        /// Image containing exactly one face
        image: PathBuf,
    },
    /// Recognize every face in an image
    Recognize {
        image: PathBuf,
        /// Maximum distance for a match (default: daemon setting)
        #[arg(short, long, value_parser = parse_threshold)]
        threshold: Option<f32>,
    },
    /// List enrolled identities
    List,
    /// Show recent recognition attempts
    History {
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
    },
    /// Remove an enrolled identity
    Remove {
        /// Identity ID to remove
        id: i64,
    },
    /// Show daemon status
    Status,
}

#[derive(Debug, Deserialize)]
struct FaceReport {
    name: String,
    distance: Option<f32>,
    confidence: f32,
    matched: bool,
}

#[derive(Debug, Deserialize)]
struct IdentitySummary {
    id: i64,
    name: String,
    dimension: usize,
    enrolled_at: String,
    source_reference: String,
}

#[derive(Debug, Deserialize)]
struct Attempt {
    matched_name: String,
    confidence: f32,
    matched: bool,
    occurred_at: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let conn = match cli.system {
        true => zbus::Connection::system().await,
        false => zbus::Connection::session().await,
    };
    let conn = conn.context("connecting to D-Bus")?;
    let proxy = FaceMatchProxy::new(&conn)
        .await
        .context("facematchd is not reachable")?;
    tracing::debug!(system_bus = cli.system, "connected to facematchd");

    match cli.command {
        Commands::Enroll { name, image } => {
            let image = absolute(image)?;
            let id = proxy.enroll(&name, &image).await?;
            println!("Enrolled {name} (id {id})");
        }
        Commands::Recognize { image, threshold } => {
            let image = absolute(image)?;
            // Negative asks the daemon for its configured default.
            let threshold = threshold.map_or(-1.0, f64::from);
            let json = proxy.recognize(&image, threshold).await?;
            let faces: Vec<FaceReport> = serde_json::from_str(&json)?;
            for (i, face) in faces.iter().enumerate() {
                println!("{}", format_face(i, face));
            }
        }
        Commands::List => {
            let identities: Vec<IdentitySummary> =
                serde_json::from_str(&proxy.list_identities().await?)?;
            if identities.is_empty() {
                println!("No identities enrolled");
            }
            for identity in &identities {
                println!(
                    "{:>6}  {:<24} {:>4}d  {}  {}",
                    identity.id,
                    identity.name,
                    identity.dimension,
                    identity.enrolled_at,
                    identity.source_reference
                );
            }
        }
        Commands::History { limit } => {
            let attempts: Vec<Attempt> = serde_json::from_str(&proxy.history(limit).await?)?;
            if attempts.is_empty() {
                println!("No recognition attempts recorded");
            }
            for attempt in &attempts {
                println!(
                    "{}  {:<24} {:>6.2}%  {}",
                    attempt.occurred_at,
                    attempt.matched_name,
                    attempt.confidence,
                    if attempt.matched { "match" } else { "no match" }
                );
            }
        }
        Commands::Remove { id } => {
            proxy.remove_identity(id).await?;
            println!("Removed identity {id}");
        }
        Commands::Status => {
            let status: serde_json::Value = serde_json::from_str(&proxy.status().await?)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}

fn parse_threshold(s: &str) -> Result<f32, String> {
    let threshold: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(format!("must be a non-negative number, got {s}"));
    }
    Ok(threshold)
}

/// The daemon resolves paths from its own working directory, so send absolute ones.
fn absolute(image: PathBuf) -> Result<String> {
    let path = std::fs::canonicalize(&image)
        .with_context(|| format!("cannot access {}", image.display()))?;
    Ok(path.to_string_lossy().into_owned())
}

fn format_face(index: usize, face: &FaceReport) -> String {
    let distance = face
        .distance
        .map_or_else(|| "-".to_string(), |d| format!("{d:.4}"));
    format!(
        "face {}: {} (confidence {:.1}%, distance {}){}",
        index + 1,
        face.name,
        face.confidence,
        distance,
        if face.matched { "" } else { " [no match]" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enroll() {
        let cli = Cli::try_parse_from(["facematch", "enroll", "--name", "Alice", "a.jpg"]).unwrap();
        match cli.command {
            Commands::Enroll { name, image } => {
                assert_eq!(name, "Alice");
                assert_eq!(image, PathBuf::from("a.jpg"));
            }
            _ => panic!("expected enroll"),
        }
        assert!(!cli.system);
    }

    #[test]
    fn test_parse_recognize_threshold() {
        let cli = Cli::try_parse_from(["facematch", "--system", "recognize", "-t", "0.45", "p.png"])
            .unwrap();
        assert!(cli.system);
        match cli.command {
            Commands::Recognize { threshold, .. } => assert_eq!(threshold, Some(0.45)),
            _ => panic!("expected recognize"),
        }
    }

    #[test]
    fn test_recognize_rejects_invalid_threshold() {
        for bad in ["-t=-0.5", "-t=nan", "-t=inf", "-t=abc"] {
            let parsed = Cli::try_parse_from(["facematch", "recognize", bad, "p.png"]);
            assert!(parsed.is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn test_recognize_zero_threshold_allowed() {
        let cli = Cli::try_parse_from(["facematch", "recognize", "-t", "0", "p.png"]).unwrap();
        assert!(matches!(cli.command, Commands::Recognize { threshold: Some(t), .. } if t == 0.0));
    }

    #[test]
    fn test_history_default_limit() {
        let cli = Cli::try_parse_from(["facematch", "history"]).unwrap();
        assert!(matches!(cli.command, Commands::History { limit: 50 }));
    }

    #[test]
    fn test_enroll_requires_name() {
        assert!(Cli::try_parse_from(["facematch", "enroll", "a.jpg"]).is_err());
    }

    #[test]
    fn test_format_face() {
        let face: FaceReport = serde_json::from_str(
            r#"{"name":"Bob","identity_id":3,"distance":0.01,"confidence":99.0,"matched":true}"#,
        )
        .unwrap();
        assert_eq!(
            format_face(0, &face),
            "face 1: Bob (confidence 99.0%, distance 0.0100)"
        );

        let face: FaceReport = serde_json::from_str(
            r#"{"name":"Unknown","identity_id":null,"distance":null,
                "confidence":0.0,"matched":false}"#,
        )
        .unwrap();
        assert_eq!(
            format_face(1, &face),
            "face 2: Unknown (confidence 0.0%, distance -) [no match]"
        );
    }
}
