use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scriptvisor_host::ModuleNameMap;
use scriptvisor_runtime::{HostServices, ModuleLoader, ModuleScanner, Runtime};
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::config::ScriptvisorConfig;
use crate::host::SimulatedHost;
use crate::reload::{take_reload_request, ReloadReceiver};

/// Command line overrides applied on top of the config file
#[derive(Debug, Clone, Default)]
pub struct HostOptions {
    pub script_dir: Option<PathBuf>,
    /// Frames the simulated host spends loading before scripts may start
    pub playing_after: u64,
}

/// Simulated host, runtime and module set, driven one frame at a time
pub struct ScriptHost {
    host: Arc<SimulatedHost>,
    runtime: Arc<Runtime>,
    loader: ModuleLoader,
    scanner: Option<ModuleScanner>,
    scripting_enabled: bool,
}

impl ScriptHost {
    pub fn new(config: &ScriptvisorConfig, options: HostOptions) -> Self {
        let host = Arc::new(SimulatedHost::new(options.playing_after));
        let names = Arc::new(ModuleNameMap::new());

        let services = HostServices::new(host.clone(), SimulatedHost::natives())
            .with_module_names(names.clone());
        let runtime = Arc::new(Runtime::new(services, config.scheduler_config()));

        let settings = config.loader_settings(options.script_dir);
        let scanner = (config.scripting.enabled && config.scripting.hot_reload).then(|| {
            ModuleScanner::with_interval(
                settings.script_dir.clone(),
                settings.extensions.clone(),
                Duration::from_millis(config.scripting.hot_reload_interval_ms),
            )
        });
        let loader = ModuleLoader::new(runtime.clone(), names, settings);

        Self {
            host,
            runtime,
            loader,
            scanner,
            scripting_enabled: config.scripting.enabled,
        }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn host(&self) -> &SimulatedHost {
        &self.host
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Load the module directory; returns how many modules were loaded
    pub fn start(&mut self) -> usize {
        if !self.scripting_enabled {
            info!(target: "scripting", "Scripting is disabled in config");
            return 0;
        }

        info!(
            target: "scripting",
            "Loading modules from {}",
            self.loader.settings().script_dir.display()
        );
        let loaded = self.loader.load_all();
        if let Some(scanner) = self.scanner.as_mut() {
            scanner.rebaseline();
            info!(
                target: "scripting",
                "Watching {} module file(s) for changes",
                scanner.known_modules()
            );
        }
        loaded
    }

    /// Unload and load every module again
    pub fn reload(&mut self) -> usize {
        if !self.scripting_enabled {
            return 0;
        }

        let loaded = self.loader.reload_all();
        if let Some(scanner) = self.scanner.as_mut() {
            scanner.rebaseline();
        }
        loaded
    }

    /// Run one host frame: advance the host, tick the scripts, then look for
    /// changed modules
    pub fn frame(&mut self) {
        self.host.advance_frame();
        self.runtime.tick();
        self.poll_module_changes();
    }

    fn poll_module_changes(&mut self) {
        let Some(scanner) = self.scanner.as_mut() else {
            return;
        };

        if scanner.should_scan() && scanner.scan_changes().has_changes() {
            info!(target: "scripting", "Module files changed, reloading");
            self.reload();
        }
    }

    /// Run frames every `frame_interval` until `frame_limit` frames have run
    /// or `shutdown` completes
    ///
    /// Scripts are ticked on the calling thread, so this must be driven by a
    /// single-threaded executor.
    pub async fn run(
        &mut self,
        frame_limit: Option<u64>,
        frame_interval: Duration,
        mut reload: ReloadReceiver,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut interval = tokio::time::interval(frame_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            if frame_limit.is_some_and(|limit| self.host.frames() >= limit) {
                info!("Ran {} frame(s), stopping", self.host.frames());
                break;
            }

            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested after {} frame(s)", self.host.frames());
                    break;
                }
                _ = interval.tick() => {
                    if take_reload_request(&mut reload) {
                        self.reload();
                    }
                    self.frame();
                }
            }
        }
    }
}
