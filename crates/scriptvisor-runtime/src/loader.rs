use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use scriptvisor_host::{ModuleId, ModuleNameMap};
use scriptvisor_scheduler::ScriptMain;
use tracing::{debug, info, warn};

use crate::runtime::Runtime;

/// Symbol looked up in every module when none is configured
pub const DEFAULT_ENTRY_SYMBOL: &str = "ScriptMain";

/// File extensions treated as script modules when none are configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["asi", "so", "dll", "dylib"];

/// Error loading a single module file
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to open module {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },
    #[error("Module {} does not export '{symbol}': {source}", .path.display())]
    MissingEntry {
        path: PathBuf,
        symbol: String,
        #[source]
        source: libloading::Error,
    },
    #[error("Module {} is already loaded", .0.display())]
    AlreadyLoaded(PathBuf),
    #[error("Script runtime rejected module '{0}'")]
    Rejected(String),
}

/// Where modules live and which of them to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderSettings {
    pub script_dir: PathBuf,
    pub entry_symbol: String,
    /// Extensions without the leading dot, compared case-insensitively
    pub extensions: Vec<String>,
    /// File stems of modules that must not be loaded
    pub disabled: HashSet<String>,
}

impl LoaderSettings {
    pub fn new(script_dir: impl Into<PathBuf>) -> Self {
        Self {
            script_dir: script_dir.into(),
            entry_symbol: DEFAULT_ENTRY_SYMBOL.to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            disabled: HashSet::new(),
        }
    }

    pub fn is_disabled(&self, name: &str) -> bool {
        self.disabled.contains(name)
    }
}

/// Whether `path` has one of `extensions`
pub fn is_module_file(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Display name of a module: its file stem
pub fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Handle the OS assigned to an open library
///
/// The handle is the module's identity: it is what a module passes to
/// `scriptRegister` when it registers itself.
fn module_handle(library: Library) -> (Library, ModuleId) {
    #[cfg(unix)]
    use libloading::os::unix::Library as OsLibrary;
    #[cfg(windows)]
    use libloading::os::windows::Library as OsLibrary;

    let handle = OsLibrary::from(library).into_raw();
    // SAFETY: `handle` was released by `into_raw` just above and is owned
    // again by the returned library
    let library = Library::from(unsafe { OsLibrary::from_raw(handle) });
    (library, ModuleId::from_raw(handle as usize))
}

struct LoadedModule {
    id: ModuleId,
    name: String,
    path: PathBuf,
    library: Library,
}

/// Opens script modules and registers their entry functions with a runtime
///
/// A module is identified by its OS library handle, and its file stem is
/// recorded in the shared [`ModuleNameMap`] so scheduler log lines can name
/// it. Modules may register themselves while being opened; otherwise the
/// loader registers their entry symbol. Everything a module registered is
/// released before its library is closed.
pub struct ModuleLoader {
    runtime: Arc<Runtime>,
    names: Arc<ModuleNameMap>,
    settings: LoaderSettings,
    modules: Vec<LoadedModule>,
}

impl ModuleLoader {
    /// `names` should be the resolver the runtime was built with
    pub fn new(runtime: Arc<Runtime>, names: Arc<ModuleNameMap>, settings: LoaderSettings) -> Self {
        Self {
            runtime,
            names,
            settings,
            modules: Vec::new(),
        }
    }

    pub fn settings(&self) -> &LoaderSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Loaded modules as `(id, name)` in load order
    pub fn modules(&self) -> Vec<(ModuleId, String)> {
        self.modules
            .iter()
            .map(|module| (module.id, module.name.clone()))
            .collect()
    }

    /// Load every enabled module in the script directory
    ///
    /// Failures are logged and skipped. Returns how many modules were loaded.
    pub fn load_all(&mut self) -> usize {
        let dir = self.settings.script_dir.clone();

        if !dir.exists() {
            info!(
                target: "scripting",
                "Script directory does not exist: {} (this is fine if no scripts are being used)",
                dir.display()
            );
            return 0;
        }

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    target: "scripting",
                    "Failed to read script directory {}: {}",
                    dir.display(),
                    e
                );
                return 0;
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_module_file(path, &self.settings.extensions))
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let name = module_name(&path);

            if self.settings.is_disabled(&name) {
                info!(
                    target: "scripting",
                    "Skipping disabled module: {} from {}",
                    name,
                    path.display()
                );
                continue;
            }

            match self.load_file(&path) {
                Ok(_) => loaded += 1,
                Err(e) => {
                    warn!(target: "scripting", "{}", e);
                }
            }
        }

        if loaded == 0 {
            info!(target: "scripting", "No modules loaded from {}", dir.display());
        } else {
            info!(target: "scripting", "Loaded {} module(s)", loaded);
        }

        loaded
    }

    /// Open one module file and make sure its script is registered
    pub fn load_file(&mut self, path: &Path) -> Result<ModuleId, LoadError> {
        if self.modules.iter().any(|module| module.path == path) {
            return Err(LoadError::AlreadyLoaded(path.to_path_buf()));
        }

        let name = module_name(path);
        let known_handlers = self.runtime.keyboard().addresses();

        // SAFETY: loading a module runs its initialisers; modules in the
        // script directory are trusted to be script modules
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let (library, id) = module_handle(library);

        if self.modules.iter().any(|module| module.id == id) {
            // Same image under another path; our extra reference is dropped
            return Err(LoadError::AlreadyLoaded(path.to_path_buf()));
        }

        self.names.insert(id, name.clone());
        self.runtime.keyboard().claim_new(id, &known_handlers);

        let self_registered = self.runtime.scheduler().unit(id).is_some();
        match self.entry_point(&library, path) {
            Ok(entry) if !self_registered => {
                if !self.runtime.register_script(id, entry) {
                    self.release(id);
                    return Err(LoadError::Rejected(name));
                }
            }
            Ok(_) => {
                debug!(target: "scripting", "Module '{}' registered its own script", name);
            }
            Err(e) if self_registered => {
                debug!(target: "scripting", "Module '{}' registered its own script: {}", name, e);
            }
            Err(e) => {
                self.release(id);
                return Err(e);
            }
        }

        info!(
            target: "scripting",
            "Loaded module: {} ({}) from {}",
            name,
            id,
            path.display()
        );

        self.modules.push(LoadedModule {
            id,
            name,
            path: path.to_path_buf(),
            library,
        });
        Ok(id)
    }

    fn entry_point(&self, library: &Library, path: &Path) -> Result<ScriptMain, LoadError> {
        let symbol = self.settings.entry_symbol.as_bytes();
        // SAFETY: the entry symbol is declared as `ScriptMain` by contract, and
        // the copied pointer is unregistered before the library is closed
        unsafe { library.get::<ScriptMain>(symbol) }
            .map(|entry| *entry)
            .map_err(|source| LoadError::MissingEntry {
                path: path.to_path_buf(),
                symbol: self.settings.entry_symbol.clone(),
                source,
            })
    }

    /// Unregister a module's script and close its library
    ///
    /// Must not be called from inside a running script.
    pub fn unload(&mut self, id: ModuleId) -> bool {
        let Some(index) = self.modules.iter().position(|module| module.id == id) else {
            return false;
        };

        let module = self.modules.remove(index);
        self.close(module);
        true
    }

    /// Unload every module, most recently loaded first
    pub fn unload_all(&mut self) {
        while let Some(module) = self.modules.pop() {
            self.close(module);
        }
    }

    /// Unload everything, then load the script directory again
    pub fn reload_all(&mut self) -> usize {
        info!(target: "scripting", "Reloading all modules");
        self.unload_all();
        self.load_all()
    }

    /// Drop everything the runtime holds that points into module `id`
    fn release(&self, id: ModuleId) {
        if self.runtime.scheduler().unit(id).is_some() {
            self.runtime.unregister_script(id);
        }
        self.runtime.keyboard().remove_owned_by(id);
        self.names.remove(id);
    }

    fn close(&self, module: LoadedModule) {
        let LoadedModule {
            id,
            name,
            library,
            ..
        } = module;

        self.release(id);

        if let Err(e) = library.close() {
            warn!(target: "scripting", "Failed to close module '{}': {}", name, e);
        } else {
            info!(target: "scripting", "Unloaded module: {}", name);
        }
    }
}

impl Drop for ModuleLoader {
    fn drop(&mut self) {
        self.unload_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_extension_matching() {
        let extensions: Vec<String> = DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect();

        assert!(is_module_file(Path::new("/scripts/trainer.asi"), &extensions));
        assert!(is_module_file(Path::new("/scripts/Trainer.DLL"), &extensions));
        assert!(is_module_file(Path::new("libhello.so"), &extensions));
        assert!(!is_module_file(Path::new("notes.txt"), &extensions));
        assert!(!is_module_file(Path::new("Makefile"), &extensions));
    }

    #[test]
    fn test_module_name_is_file_stem() {
        assert_eq!(module_name(Path::new("/scripts/trainer.asi")), "trainer");
        assert_eq!(module_name(Path::new("libhello.so")), "libhello");
    }

    #[test]
    fn test_default_settings() {
        let mut settings = LoaderSettings::new("/tmp/scripts");
        assert_eq!(settings.entry_symbol, "ScriptMain");
        assert_eq!(settings.extensions.len(), 4);
        assert!(!settings.is_disabled("trainer"));

        settings.disabled.insert("trainer".to_string());
        assert!(settings.is_disabled("trainer"));
    }
}
