//! # Command Dispatcher
//!
//! Maps one CLI subcommand onto the supervisor and prints the result.
//! Reports go to the output writer; diagnostics go through `tracing`.
//!
//! Every command that completes returns `Ok`, whatever the node's health:
//! a slow-starting node is reported, not treated as a failure.

use std::future::Future;
use std::io;
use std::path::Path;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::adapters::{log_tail, SupervisorDependencies};
use crate::cli::Command;
use crate::config::NodeConfig;
use crate::domain::errors::SupervisorError;
use crate::domain::health::HealthStatus;
use crate::domain::keys::KeySet;

use super::key_store::KeyMaterialStore;
use super::supervisor::ProcessSupervisor;

/// Poll interval while following the log.
pub const ATTACH_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct CommandDispatcher<W> {
    supervisor: ProcessSupervisor,
    keys: KeyMaterialStore,
    out: W,
}

impl<W> CommandDispatcher<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(config: NodeConfig, deps: SupervisorDependencies, out: W) -> Self {
        let keys = KeyMaterialStore::new(deps.runner.clone(), &config.binaries.keygen);
        let supervisor = ProcessSupervisor::new(config, &deps);
        Self {
            supervisor,
            keys,
            out,
        }
    }

    pub fn supervisor(&self) -> &ProcessSupervisor {
        &self.supervisor
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Run `command` to completion. `attach` stops on Ctrl-C.
    pub async fn dispatch(&mut self, command: Command) -> Result<(), SupervisorError> {
        info!(command = ?command, "dispatching");
        match command {
            Command::Start => self.start().await,
            Command::Stop => self.stop().await,
            Command::Restart => self.restart().await,
            Command::Status { json } => self.status(json).await,
            Command::Logs { lines } => self.logs(lines).await,
            Command::Attach => self.attach_until(interrupted()).await,
            Command::Test => self.test().await,
        }
    }

    fn resolve_keys(&self) -> Result<KeySet, SupervisorError> {
        Ok(self.keys.resolve(&self.supervisor.config().keys_dir)?)
    }

    async fn start(&mut self) -> Result<(), SupervisorError> {
        let keys = self.resolve_keys()?;
        let report = self.supervisor.start(&keys).await?;
        self.print(&report.to_string()).await?;
        if report.health != HealthStatus::Responding {
            self.print("warning: node is not responding yet; check `status` or `logs`")
                .await?;
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SupervisorError> {
        let report = self.supervisor.stop().await?;
        self.print(&report.to_string()).await
    }

    async fn restart(&mut self) -> Result<(), SupervisorError> {
        // keys first, so a configuration error leaves the running node alone
        let keys = self.resolve_keys()?;
        let report = self.supervisor.restart(&keys).await?;
        self.print(&report.stop.to_string()).await?;
        self.print(&report.start.to_string()).await?;
        if report.start.health != HealthStatus::Responding {
            self.print("warning: node is not responding yet; check `status` or `logs`")
                .await?;
        }
        Ok(())
    }

    async fn status(&mut self, json: bool) -> Result<(), SupervisorError> {
        let report = self.supervisor.status().await?;
        let text = if json {
            serde_json::to_string_pretty(&report)
                .map_err(|e| SupervisorError::io("failed to encode status report", e.into()))?
        } else {
            report.to_string()
        };
        self.print(&text).await
    }

    async fn logs(&mut self, lines: usize) -> Result<(), SupervisorError> {
        let path = self.supervisor.config().log_file();
        if !path.exists() {
            return self.no_log(&path).await;
        }
        let tail = log_tail::read_last_lines(&path, lines)
            .await
            .map_err(|e| SupervisorError::io(format!("failed to read {}", path.display()), e))?;
        for line in tail {
            self.print(&line).await?;
        }
        Ok(())
    }

    /// Stream the validator log from its current end until `stop` resolves.
    pub async fn attach_until<F>(&mut self, stop: F) -> Result<(), SupervisorError>
    where
        F: Future<Output = ()>,
    {
        let path = self.supervisor.config().log_file();
        if !path.exists() {
            return self.no_log(&path).await;
        }

        let offset = log_tail::file_len(&path).await;
        self.print(&format!(
            "following {} (Ctrl-C to detach; the validator keeps running)",
            path.display()
        ))
        .await?;
        log_tail::follow(&path, offset, &mut self.out, ATTACH_POLL_INTERVAL, stop)
            .await
            .map_err(|e| SupervisorError::io(format!("failed to follow {}", path.display()), e))?;
        Ok(())
    }

    async fn test(&mut self) -> Result<(), SupervisorError> {
        let endpoint = self.supervisor.health().endpoint().to_string();
        self.print(&format!("probing {}", endpoint)).await?;

        let reports = self.supervisor.health().run_probes().await;
        let passed = reports.iter().filter(|r| r.passed).count();
        for report in &reports {
            self.print(&report.to_string()).await?;
        }
        self.print(&format!("{}/{} probes passed", passed, reports.len()))
            .await
    }

    async fn no_log(&mut self, path: &Path) -> Result<(), SupervisorError> {
        self.print(&format!(
            "no log at {} (has the validator been started?)",
            path.display()
        ))
        .await
    }

    async fn print(&mut self, text: &str) -> Result<(), SupervisorError> {
        self.write_line(text)
            .await
            .map_err(|e| SupervisorError::io("failed to write output", e))
    }

    async fn write_line(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await
    }
}

async fn interrupted() {
    // if the handler cannot be installed, follow until the process is killed
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::domain::keys::KeyRole;
    use crate::test_utils::{test_config, write_key_files, MockEnvironment, VALIDATOR_EXE};

    fn dispatcher(
        root: &Path,
        env: &MockEnvironment,
    ) -> CommandDispatcher<Vec<u8>> {
        CommandDispatcher::new(test_config(root), env.dependencies(), Vec::new())
    }

    fn output(d: CommandDispatcher<Vec<u8>>) -> String {
        String::from_utf8(d.into_output()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_prints_report() {
        let root = tempfile::tempdir().unwrap();
        write_key_files(&root.path().join("keys")).unwrap();
        let env = MockEnvironment::new();
        env.transport.set_up(true);

        let mut d = dispatcher(root.path(), &env);
        d.dispatch(Command::Start).await.unwrap();

        let text = output(d);
        assert!(text.contains("validator started"));
        assert!(text.contains("health: responding"));
        assert_eq!(env.control.live_pids(VALIDATOR_EXE).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_succeeds_with_warning_when_unhealthy() {
        let root = tempfile::tempdir().unwrap();
        write_key_files(&root.path().join("keys")).unwrap();
        let env = MockEnvironment::new();

        let mut d = dispatcher(root.path(), &env);
        d.dispatch(Command::Start).await.unwrap();
        assert!(output(d).contains("warning: node is not responding yet"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_key_aborts_before_any_side_effect() {
        let root = tempfile::tempdir().unwrap();
        let keys = root.path().join("keys");
        write_key_files(&keys).unwrap();
        fs::remove_file(KeyRole::Stake.path_in(&keys)).unwrap();
        let env = MockEnvironment::new();

        let mut d = dispatcher(root.path(), &env);
        let err = d.dispatch(Command::Start).await.unwrap_err();

        assert!(err.to_string().contains("stake-account-keypair"));
        assert!(env.runner.calls().is_empty());
        assert!(env.control.spawned().is_empty());
        assert!(!root.path().join("ledger").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_refuses_keys_inside_ledger() {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path());
        config.keys_dir = config.ledger_dir.join("keys");
        write_key_files(&config.keys_dir).unwrap();
        let env = MockEnvironment::new();
        env.transport.set_up(true);

        let mut d = CommandDispatcher::new(config.clone(), env.dependencies(), Vec::new());
        let err = d.dispatch(Command::Start).await.unwrap_err();

        assert!(matches!(err, SupervisorError::Config(_)));
        assert!(config.keys_dir.join("identity-keypair.json").is_file());
        assert!(env.control.spawned().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_with_missing_key_leaves_node_running() {
        let root = tempfile::tempdir().unwrap();
        let keys = root.path().join("keys");
        write_key_files(&keys).unwrap();
        let env = MockEnvironment::new();
        env.transport.set_up(true);
        dispatcher(root.path(), &env)
            .dispatch(Command::Start)
            .await
            .unwrap();

        fs::remove_file(KeyRole::Vote.path_in(&keys)).unwrap();
        let err = dispatcher(root.path(), &env)
            .dispatch(Command::Restart)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("vote-account-keypair"));
        assert_eq!(env.control.live_pids(VALIDATOR_EXE).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_json() {
        let root = tempfile::tempdir().unwrap();
        let env = MockEnvironment::new();

        let mut d = dispatcher(root.path(), &env);
        d.dispatch(Command::Status { json: true }).await.unwrap();

        let value: serde_json::Value = serde_json::from_str(&output(d)).unwrap();
        assert_eq!(value["state"], "stopped");
        assert_eq!(value["pid"], serde_json::Value::Null);
        assert_eq!(value["health"], "unknown");
    }

    #[tokio::test]
    async fn test_logs_tail_and_missing_log() {
        let root = tempfile::tempdir().unwrap();
        let env = MockEnvironment::new();

        let mut d = dispatcher(root.path(), &env);
        d.dispatch(Command::Logs { lines: 2 }).await.unwrap();
        assert!(output(d).contains("no log at"));

        let ledger = root.path().join("ledger");
        fs::create_dir_all(&ledger).unwrap();
        fs::write(ledger.join("identity-keypair.log"), "one\ntwo\nthree\n").unwrap();

        let mut d = dispatcher(root.path(), &env);
        d.dispatch(Command::Logs { lines: 2 }).await.unwrap();
        assert_eq!(output(d), "two\nthree\n");
    }

    #[tokio::test]
    async fn test_attach_streams_new_output() {
        let root = tempfile::tempdir().unwrap();
        let ledger = root.path().join("ledger");
        fs::create_dir_all(&ledger).unwrap();
        let log = ledger.join("identity-keypair.log");
        fs::write(&log, "before attach\n").unwrap();
        let env = MockEnvironment::new();

        let writer = log.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let mut f = fs::OpenOptions::new().append(true).open(&writer).unwrap();
            std::io::Write::write_all(&mut f, b"slot 1 confirmed\n").unwrap();
        });

        let mut d = dispatcher(root.path(), &env);
        d.attach_until(tokio::time::sleep(Duration::from_millis(600)))
            .await
            .unwrap();

        let text = output(d);
        assert!(text.contains("slot 1 confirmed"));
        assert!(!text.contains("before attach"));
    }

    #[tokio::test]
    async fn test_probes_against_dead_node_complete() {
        let root = tempfile::tempdir().unwrap();
        let env = MockEnvironment::new();

        let mut d = dispatcher(root.path(), &env);
        d.dispatch(Command::Test).await.unwrap();

        let text = output(d);
        assert_eq!(text.matches("FAIL").count(), 3);
        assert!(text.contains("0/3 probes passed"));
        assert_eq!(
            env.transport.methods(),
            vec!["getHealth", "getSlot", "getVersion"]
        );
    }
}
