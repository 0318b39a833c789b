use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use scriptvisor::config::ScriptvisorConfig;
use scriptvisor::host::GET_FRAME_COUNT;
use scriptvisor::{HostOptions, ScriptHost};
use scriptvisor_host::ModuleId;
use scriptvisor_runtime::Runtime;
use tempfile::TempDir;
use tokio::sync::watch;

fn config_for(dir: &TempDir) -> ScriptvisorConfig {
    let mut config = ScriptvisorConfig::default();
    config.scripting.script_dir = Some(dir.path().to_path_buf());
    config.scripting.hot_reload_interval_ms = 1;
    config
}

#[tokio::test]
async fn test_scripts_start_once_host_is_playing() {
    static RUNTIME: OnceLock<Arc<Runtime>> = OnceLock::new();
    static FRAME_SEEN: AtomicU64 = AtomicU64::new(0);
    static RESUMES: AtomicU32 = AtomicU32::new(0);

    extern "C-unwind" fn script() {
        let runtime = RUNTIME.get().unwrap();
        FRAME_SEEN.store(
            runtime.natives().invoke::<i32>(GET_FRAME_COUNT, &[]) as u64,
            Ordering::SeqCst,
        );
        loop {
            RESUMES.fetch_add(1, Ordering::SeqCst);
            runtime.scheduler().wait(0);
        }
    }

    let dir = TempDir::new().unwrap();
    let mut host = ScriptHost::new(
        &config_for(&dir),
        HostOptions {
            script_dir: None,
            playing_after: 3,
        },
    );
    RUNTIME.set(host.runtime().clone()).ok().unwrap();

    assert_eq!(host.start(), 0);
    host.runtime().register_script(ModuleId::from_raw(0x51), script);

    let (_reload_tx, reload_rx) = watch::channel(0u64);
    host.run(
        Some(5),
        Duration::from_millis(1),
        reload_rx,
        std::future::pending(),
    )
    .await;

    assert_eq!(host.host().frames(), 5);
    // The frame counter native is process-wide, so only check it answered
    assert!(FRAME_SEEN.load(Ordering::SeqCst) >= 1);
    assert_eq!(RESUMES.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_shutdown_stops_the_loop() {
    let dir = TempDir::new().unwrap();
    let mut host = ScriptHost::new(&config_for(&dir), HostOptions::default());

    let (_reload_tx, reload_rx) = watch::channel(0u64);
    host.run(None, Duration::from_millis(1), reload_rx, async {}).await;

    assert_eq!(host.host().frames(), 0);
}

#[tokio::test]
async fn test_changed_module_files_trigger_reload() {
    let dir = TempDir::new().unwrap();
    let mut host = ScriptHost::new(&config_for(&dir), HostOptions::default());
    host.start();

    // A broken module appears; the reload logs the failure and carries on
    File::create(dir.path().join("broken.so"))
        .unwrap()
        .write_all(b"not a library")
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    host.frame();

    assert!(host.loader().is_empty());
    assert_eq!(host.runtime().scheduler().script_count(), 0);
}

#[tokio::test]
async fn test_disabled_scripting_loads_nothing() {
    let dir = TempDir::new().unwrap();
    File::create(dir.path().join("broken.so")).unwrap();

    let mut config = config_for(&dir);
    config.scripting.enabled = false;

    let mut host = ScriptHost::new(&config, HostOptions::default());
    assert_eq!(host.start(), 0);
    assert_eq!(host.reload(), 0);
}
