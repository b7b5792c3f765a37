//! Static-site server management - spawning and health checking

use pageprobe_common::config::ServerSettings;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};
use crate::spec::resolve_url;

/// Handle to a running server process, stopped on drop
pub struct ServerHandle {
    child: Child,
    health_url: String,
}

impl ServerHandle {
    /// Spawn the configured command and wait until `base_url` answers
    pub async fn spawn(config: ServerConfig) -> E2eResult<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| E2eError::ServerStartup("empty server command".to_string()))?;

        info!("Spawning server: {}", config.command.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args).stdout(Stdio::null()).stderr(Stdio::null());
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| E2eError::ServerStartup(format!("Failed to spawn {}: {}", program, e)))?;

        let handle = ServerHandle {
            child,
            health_url: resolve_url(&config.base_url, &config.health_path),
        };

        // Dropping the handle on failure stops the child
        handle.wait_for_healthy(config.startup_timeout).await?;

        info!("Server is healthy at {}", config.base_url);
        Ok(handle)
    }

    /// Wait for the health URL to respond with a success status
    async fn wait_for_healthy(&self, timeout_duration: Duration) -> E2eResult<()> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        let start = std::time::Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout_duration {
            attempts += 1;

            match client.get(&self.health_url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for server to start...");
                    }
                    // Connection refused is expected while server is starting
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(100)).await;
        }

        Err(E2eError::ServerHealthCheck(attempts))
    }

    /// Stop the server: SIGTERM, a short grace period, then kill
    pub async fn stop(&mut self) {
        if self.exited() {
            return;
        }

        info!("Stopping server (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                sleep(Duration::from_millis(500)).await;
            }
        }

        self.kill();
    }

    fn exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    fn kill(&mut self) {
        if self.exited() {
            return;
        }
        if let Err(e) = self.child.kill() {
            warn!("Failed to kill server (pid: {}): {}", self.child.id(), e);
        }
        if let Err(e) = self.child.wait() {
            warn!("Failed to reap server (pid: {}): {}", self.child.id(), e);
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        // no grace period outside async code
        self.kill();
    }
}

/// Configuration for spawning a server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Program and arguments
    pub command: Vec<String>,

    pub working_dir: Option<PathBuf>,

    /// Base URL the server will answer on
    pub base_url: String,

    /// Path polled until it answers with a success status
    pub health_path: String,

    pub startup_timeout: Duration,
}

impl ServerConfig {
    pub fn from_settings(settings: &ServerSettings, base_url: &str) -> Self {
        Self {
            command: settings.command.clone(),
            working_dir: settings.working_dir.clone(),
            base_url: base_url.to_string(),
            health_path: settings.health_path.clone(),
            startup_timeout: Duration::from_millis(settings.startup_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let config = ServerConfig {
            command: Vec::new(),
            working_dir: None,
            base_url: "http://127.0.0.1:8000".to_string(),
            health_path: "/".to_string(),
            startup_timeout: Duration::from_millis(100),
        };
        assert!(matches!(
            ServerHandle::spawn(config).await,
            Err(E2eError::ServerStartup(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_program_is_rejected() {
        let settings = ServerSettings {
            command: vec!["pageprobe-no-such-program".to_string()],
            working_dir: None,
            health_path: "/".to_string(),
            startup_timeout_ms: 100,
        };
        let config = ServerConfig::from_settings(&settings, "http://127.0.0.1:1");
        assert!(matches!(
            ServerHandle::spawn(config).await,
            Err(E2eError::ServerStartup(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_terminates_the_process() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let mut handle = ServerHandle {
            child,
            health_url: "http://127.0.0.1:1/".to_string(),
        };
        handle.stop().await;
        assert!(handle.exited());

        // a second stop is a no-op
        handle.stop().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unhealthy_server_is_stopped() {
        let config = ServerConfig {
            command: vec!["sleep".to_string(), "30".to_string()],
            working_dir: None,
            base_url: "http://127.0.0.1:1".to_string(),
            health_path: "/".to_string(),
            startup_timeout: Duration::from_millis(300),
        };
        assert!(matches!(
            ServerHandle::spawn(config).await,
            Err(E2eError::ServerHealthCheck(_))
        ));
    }
}
