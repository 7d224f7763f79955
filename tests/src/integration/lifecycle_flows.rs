//! # Lifecycle Flows
//!
//! start / stop / restart as separate invocations sharing one ledger.

#[cfg(test)]
mod tests {
    use std::fs;

    use validator_supervisor::domain::ErrorCategory;
    use validator_supervisor::test_utils::{
        test_config, write_key_files, MockEnvironment, GENESIS_ARTIFACT, VALIDATOR_EXE,
    };
    use validator_supervisor::Command;

    use crate::integration::invoke;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// A workdir with keys in place and a node that answers RPC.
    fn healthy_setup() -> (tempfile::TempDir, MockEnvironment) {
        let root = tempfile::tempdir().unwrap();
        write_key_files(&root.path().join("keys")).unwrap();
        let env = MockEnvironment::new();
        env.transport.set_up(true);
        (root, env)
    }

    fn recorded_pid(root: &std::path::Path) -> u32 {
        let pid_file = test_config(root).pid_file();
        fs::read_to_string(pid_file).unwrap().trim().parse().unwrap()
    }

    // =============================================================================
    // START / STOP
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_start_then_stop() {
        let (root, env) = healthy_setup();

        let out = invoke(root.path(), &env, Command::Start).await.unwrap();
        assert!(out.contains("validator started"));
        let pid = recorded_pid(root.path());
        assert!(env.control.is_alive(pid));

        let out = invoke(root.path(), &env, Command::Stop).await.unwrap();
        assert!(out.contains(&format!("validator stopped (pid {})", pid)));
        assert!(!env.control.is_alive(pid));
        assert!(!test_config(root.path()).pid_file().exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_keeps_single_validator() {
        let (root, env) = healthy_setup();

        invoke(root.path(), &env, Command::Start).await.unwrap();
        let first = recorded_pid(root.path());
        invoke(root.path(), &env, Command::Start).await.unwrap();
        let second = recorded_pid(root.path());

        assert_ne!(first, second);
        assert_eq!(env.control.live_pids(VALIDATOR_EXE), vec![second]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let (root, env) = healthy_setup();

        let out = invoke(root.path(), &env, Command::Stop).await.unwrap();
        assert!(out.contains("validator is not running"));

        invoke(root.path(), &env, Command::Start).await.unwrap();
        invoke(root.path(), &env, Command::Stop).await.unwrap();
        let out = invoke(root.path(), &env, Command::Stop).await.unwrap();
        assert!(out.contains("validator is not running"));
        assert!(env.control.live_pids(VALIDATOR_EXE).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_after_crash_clears_stale_record() {
        let (root, env) = healthy_setup();
        invoke(root.path(), &env, Command::Start).await.unwrap();
        let pid = recorded_pid(root.path());

        env.control.kill_externally(pid);
        let out = invoke(root.path(), &env, Command::Stop).await.unwrap();

        assert!(out.contains("stale pid record"));
        assert!(!test_config(root.path()).pid_file().exists());
    }

    // =============================================================================
    // RESTART
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_running_validator() {
        let (root, env) = healthy_setup();
        invoke(root.path(), &env, Command::Start).await.unwrap();
        let old = recorded_pid(root.path());

        let out = invoke(root.path(), &env, Command::Restart).await.unwrap();
        let new = recorded_pid(root.path());

        assert!(out.contains(&format!("validator stopped (pid {})", old)));
        assert!(out.contains(&format!("validator started (pid {})", new)));
        assert_eq!(env.control.live_pids(VALIDATOR_EXE), vec![new]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_when_idle_starts() {
        let (root, env) = healthy_setup();

        let out = invoke(root.path(), &env, Command::Restart).await.unwrap();

        assert!(out.contains("validator is not running"));
        assert!(out.contains("validator started"));
        assert_eq!(env.control.live_pids(VALIDATOR_EXE).len(), 1);
    }

    // =============================================================================
    // CONTENTION AND BOOTSTRAP
    // =============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_start_reclaims_rpc_port_from_foreign_process() {
        let (root, env) = healthy_setup();
        let squatter = env.control.add_process("nginx", &[8899]);

        invoke(root.path(), &env, Command::Start).await.unwrap();

        assert!(!env.control.is_alive(squatter));
        assert_eq!(env.control.live_pids(VALIDATOR_EXE).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreclaimable_port_aborts_before_genesis() {
        let (root, env) = healthy_setup();
        env.control.add_unknown_listener(8899);

        let err = invoke(root.path(), &env, Command::Start).await.unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Contention);
        assert!(env.runner.calls_to("solana-genesis").is_empty());
        assert!(env.control.spawned().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_genesis_rebuilt_on_every_start() {
        let (root, env) = healthy_setup();
        let genesis = test_config(root.path()).genesis_dir();

        invoke(root.path(), &env, Command::Start).await.unwrap();
        fs::write(genesis.join("rocksdb-leftover"), "stale").unwrap();
        invoke(root.path(), &env, Command::Start).await.unwrap();

        assert!(genesis.join(GENESIS_ARTIFACT).exists());
        assert!(!genesis.join("rocksdb-leftover").exists());
        assert_eq!(env.runner.calls_to("solana-genesis").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_crash_log() {
        let (root, env) = healthy_setup();
        let log = test_config(root.path()).log_file();

        invoke(root.path(), &env, Command::Start).await.unwrap();
        let mut contents = fs::read_to_string(&log).unwrap();
        contents.push_str("thread 'solReplayStage' panicked\n");
        fs::write(&log, contents).unwrap();
        invoke(root.path(), &env, Command::Restart).await.unwrap();

        let out = invoke(root.path(), &env, Command::Logs { lines: 10 })
            .await
            .unwrap();
        assert!(out.contains("thread 'solReplayStage' panicked"));
    }
}
