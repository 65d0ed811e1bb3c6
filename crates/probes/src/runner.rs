//! Probe execution

use crate::{Check, ProbeDefinition};
use alerting::Outcome;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, info};

/// Connect timeout for port checks that have no explicit limit
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run every check of `probe` in order. The probe succeeds only if all of
/// them do; otherwise the failure details are joined into one message.
pub async fn run_probe(probe: &ProbeDefinition) -> Outcome {
    let timeout = probe.timeout();
    let mut failures = Vec::new();

    for check in &probe.checks {
        if let Err(detail) = run_check(check, timeout).await {
            debug!("{}.{}: {}", probe.group, probe.name, detail);
            failures.push(detail);
        }
    }

    if failures.is_empty() {
        Outcome::Success
    } else {
        Outcome::Failure(failures.join("; "))
    }
}

/// Run a single check, returning a failure description on error
pub async fn run_check(check: &Check, timeout: Option<Duration>) -> Result<(), String> {
    match check {
        Check::Command { command } => run_command(command, timeout).await,
        Check::Port { host, port } => {
            connect(host, *port, timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT)).await
        }
    }
}

async fn run_command(command: &str, timeout: Option<Duration>) -> Result<(), String> {
    let mut child = Command::new("sh");
    child
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = match with_limit(timeout, child.output()).await {
        Some(result) => result,
        None => {
            return Err(format!(
                "Timeout! {} took longer than {} seconds to execute.",
                command,
                timeout.map(|t| t.as_secs_f64()).unwrap_or_default()
            ))
        }
    };

    let output = output
        .map_err(|e| format!("Command failed: '{}' could not be started: {}", command, e))?;

    if output.status.success() {
        info!("Command executed: {}", command);
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        Err(format!("Command failed: '{}' exited with {}", command, output.status))
    } else {
        Err(format!(
            "Command failed: '{}' exited with {}: {}",
            command, output.status, stderr
        ))
    }
}

async fn connect(host: &str, port: u16, timeout: Duration) -> Result<(), String> {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => {
            info!("Port reachable: {}:{}", host, port);
            Ok(())
        }
        Ok(Err(e)) => Err(format!("Port {}:{} unreachable: {}", host, port, e)),
        Err(_) => Err(format!(
            "Timeout! {}:{} did not accept a connection within {} seconds.",
            host,
            port,
            timeout.as_secs_f64()
        )),
    }
}

/// `None` if `limit` elapsed first
async fn with_limit<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn probe(checks: Vec<Check>, timeout_seconds: Option<f64>) -> ProbeDefinition {
        ProbeDefinition {
            group: "Test_Monitor".to_string(),
            name: "check".to_string(),
            checks,
            timeout_seconds,
            threshold: 1,
            enabled: true,
        }
    }

    fn command(command: &str) -> Check {
        Check::Command {
            command: command.to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_command() {
        assert_eq!(run_check(&command("true"), None).await, Ok(()));
    }

    #[tokio::test]
    async fn test_failing_command() {
        let detail = run_check(&command("exit 3"), None).await.unwrap_err();
        assert!(detail.starts_with("Command failed: 'exit 3' exited with"));
        assert!(detail.contains('3'));
    }

    #[tokio::test]
    async fn test_failing_command_reports_stderr() {
        let detail = run_check(&command("echo 'mount stale' >&2; false"), None)
            .await
            .unwrap_err();
        assert!(detail.ends_with(": mount stale"));
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let detail = run_check(&command("sleep 5"), Some(Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert_eq!(detail, "Timeout! sleep 5 took longer than 0.2 seconds to execute.");
    }

    #[tokio::test]
    async fn test_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let check = Check::Port {
            host: "127.0.0.1".to_string(),
            port,
        };

        assert_eq!(run_check(&check, Some(Duration::from_secs(2))).await, Ok(()));
    }

    #[tokio::test]
    async fn test_closed_port() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let check = Check::Port {
            host: "127.0.0.1".to_string(),
            port,
        };

        let detail = run_check(&check, Some(Duration::from_secs(2))).await.unwrap_err();
        assert!(detail.starts_with(&format!("Port 127.0.0.1:{} unreachable", port)));
    }

    #[tokio::test]
    async fn test_probe_passes_when_all_checks_pass() {
        let outcome = run_probe(&probe(vec![command("true"), command("exit 0")], Some(2.0))).await;
        assert_eq!(outcome, Outcome::Success);
    }

    #[tokio::test]
    async fn test_probe_collects_every_failure() {
        let outcome = run_probe(&probe(
            vec![command("exit 1"), command("true"), command("exit 2")],
            Some(2.0),
        ))
        .await;

        match outcome {
            Outcome::Failure(detail) => {
                let parts: Vec<_> = detail.split("; ").collect();
                assert_eq!(parts.len(), 2);
                assert!(parts[0].contains("'exit 1'"));
                assert!(parts[1].contains("'exit 2'"));
            }
            Outcome::Success => panic!("expected failure"),
        }
    }
}
