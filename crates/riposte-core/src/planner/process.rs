//! Strategy source backed by an external command.
//!
//! Each request spawns the command, writes the request as one JSON document
//! to its stdin, closes stdin and takes everything on stdout as the reply.
//! The child is killed if the pipeline abandons the request at its deadline.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::oracle::{StrategyRequest, StrategySource};
use crate::error::OracleError;

/// Runs `program args...` once per request.
#[derive(Debug, Clone)]
pub struct ProcessOracle {
    program: String,
    args: Vec<String>,
}

impl ProcessOracle {
    /// Creates an oracle for `program` with fixed arguments.
    #[must_use]
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl StrategySource for ProcessOracle {
    fn name(&self) -> &str {
        &self.program
    }

    async fn decide(&self, request: &StrategyRequest) -> Result<String, OracleError> {
        let payload = serde_json::to_vec(request)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OracleError::Spawn {
                command: self.command_line(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(OracleError::ExitStatus {
                status: output.status.to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(OracleError::EmptyReply);
        }
        Ok(text)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::adaptation::AdaptationProfile;
    use crate::predictor::FutureSnapshot;
    use crate::snapshot::{ActorView, ObstacleProximity, TickId};
    use glam::Vec2;

    fn request() -> StrategyRequest {
        let view = ActorView {
            position: Vec2::new(100.0, 100.0),
            velocity: Vec2::ZERO,
            hp: 100.0,
            cooldown_remaining: 0.0,
            radius: 16.0,
        };
        StrategyRequest {
            tick_id: TickId::new(12),
            snapshot: FutureSnapshot {
                tick_id: TickId::new(12),
                time_s: 0.2,
                latency_s: 0.35,
                actor: view,
                opponent: view,
                threats: Vec::new(),
                obstacles: ObstacleProximity {
                    north: 10.0,
                    east: 10.0,
                    south: 10.0,
                    west: 10.0,
                },
                adaptation: AdaptationProfile::default(),
            },
            adaptation_features: AdaptationProfile::default(),
            style_note: None,
        }
    }

    #[tokio::test]
    async fn reads_stdout_as_reply() {
        let oracle = ProcessOracle::new(
            "sh",
            vec!["-c".into(), "cat > /dev/null; echo '{\"dx\": 0.5, \"tick_id\": 12}'".into()],
        );
        let text = oracle.decide(&request()).await.unwrap();
        assert_eq!(text, "{\"dx\": 0.5, \"tick_id\": 12}");
    }

    #[tokio::test]
    async fn request_json_reaches_stdin() {
        let oracle = ProcessOracle::new("sh", vec!["-c".into(), "cat".into()]);
        let text = oracle.decide(&request()).await.unwrap();
        let echoed: StrategyRequest = serde_json::from_str(&text).unwrap();
        assert_eq!(echoed.tick_id, TickId::new(12));
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let oracle = ProcessOracle::new("sh", vec!["-c".into(), "cat > /dev/null; exit 3".into()]);
        assert!(matches!(
            oracle.decide(&request()).await,
            Err(OracleError::ExitStatus { .. })
        ));
    }

    #[tokio::test]
    async fn empty_output_is_an_error() {
        let oracle = ProcessOracle::new("sh", vec!["-c".into(), "cat > /dev/null".into()]);
        assert!(matches!(oracle.decide(&request()).await, Err(OracleError::EmptyReply)));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let oracle = ProcessOracle::new("riposte-no-such-binary", Vec::new());
        assert!(matches!(oracle.decide(&request()).await, Err(OracleError::Spawn { .. })));
    }
}
