//! # Operator Flows
//!
//! Read-only commands and misconfiguration handling.

#[cfg(test)]
mod tests {
    use std::fs;

    use validator_supervisor::domain::{ErrorCategory, KeyRole};
    use validator_supervisor::test_utils::{write_key_files, MockEnvironment, VALIDATOR_EXE};
    use validator_supervisor::Command;

    use crate::integration::invoke;

    // =============================================================================
    // STATUS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_status_tracks_lifecycle() {
        let root = tempfile::tempdir().unwrap();
        write_key_files(&root.path().join("keys")).unwrap();
        let env = MockEnvironment::new();
        env.transport.set_up(true);

        let out = invoke(root.path(), &env, Command::Status { json: false })
            .await
            .unwrap();
        assert!(out.contains("state:    stopped"));

        invoke(root.path(), &env, Command::Start).await.unwrap();
        let out = invoke(root.path(), &env, Command::Status { json: true })
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["state"], "running");
        assert_eq!(value["health"], "responding");
        assert!(value["pid"].is_u64());

        let pid = value["pid"].as_u64().unwrap() as u32;
        env.control.kill_externally(pid);
        let out = invoke(root.path(), &env, Command::Status { json: true })
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["state"], "stopped");
        assert_eq!(value["stale_record"], true);
    }

    // =============================================================================
    // LOGS
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_logs_show_validator_output() {
        let root = tempfile::tempdir().unwrap();
        write_key_files(&root.path().join("keys")).unwrap();
        let env = MockEnvironment::new();

        let out = invoke(root.path(), &env, Command::Logs { lines: 10 })
            .await
            .unwrap();
        assert!(out.contains("no log at"));

        invoke(root.path(), &env, Command::Start).await.unwrap();
        let out = invoke(root.path(), &env, Command::Logs { lines: 10 })
            .await
            .unwrap();
        assert!(!out.is_empty());
        assert!(!out.contains("no log at"));
    }

    // =============================================================================
    // PROBES
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_probes_pass_against_healthy_node() {
        let root = tempfile::tempdir().unwrap();
        let env = MockEnvironment::new();
        env.transport.set_up(true);

        let out = invoke(root.path(), &env, Command::Test).await.unwrap();

        assert!(out.contains("probing http://127.0.0.1:8899/"));
        assert_eq!(out.matches("PASS").count(), 3);
        assert!(out.contains("3/3 probes passed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_against_dead_node_report_failures() {
        let root = tempfile::tempdir().unwrap();
        let env = MockEnvironment::new();

        let out = invoke(root.path(), &env, Command::Test).await.unwrap();

        assert_eq!(out.matches("FAIL").count(), 3);
        assert!(out.contains("0/3 probes passed"));
    }

    // =============================================================================
    // MISCONFIGURATION
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_missing_stake_key_fails_without_side_effects() {
        let root = tempfile::tempdir().unwrap();
        let keys = root.path().join("keys");
        write_key_files(&keys).unwrap();
        fs::remove_file(KeyRole::Stake.path_in(&keys)).unwrap();
        let env = MockEnvironment::new();

        let err = invoke(root.path(), &env, Command::Start).await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.to_string().contains("stake-account-keypair"));
        assert!(env.control.live_pids(VALIDATOR_EXE).is_empty());
        assert!(!root.path().join("ledger").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_launch_that_exits_immediately_fails() {
        let root = tempfile::tempdir().unwrap();
        write_key_files(&root.path().join("keys")).unwrap();
        let env = MockEnvironment::new();
        env.control.exit_on_next_launch("exit status: 1");

        let err = invoke(root.path(), &env, Command::Start).await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Launch);
        let out = invoke(root.path(), &env, Command::Status { json: true })
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["pid"], serde_json::Value::Null);
    }
}
