use std::env::consts::{DLL_EXTENSION, DLL_PREFIX, DLL_SUFFIX};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use scriptvisor_host::{GameState, ModuleId, ModuleNameMap, ModuleNames, SharedHostState};
use scriptvisor_natives::NativeRegistry;
use scriptvisor_runtime::{HostServices, LoadError, LoaderSettings, ModuleLoader, Runtime};
use scriptvisor_scheduler::{ManualClock, SchedulerConfig, UnitStatus};
use tempfile::TempDir;

fn loader(settings: LoaderSettings) -> (Arc<Runtime>, ModuleLoader) {
    loader_with_names(settings, Arc::new(ModuleNameMap::new()))
}

fn loader_with_names(
    settings: LoaderSettings,
    names: Arc<ModuleNameMap>,
) -> (Arc<Runtime>, ModuleLoader) {
    let services = HostServices::new(
        Arc::new(SharedHostState::new(GameState::Playing)),
        Arc::new(NativeRegistry::new()),
    )
    .with_module_names(names.clone())
    .with_clock(Arc::new(ManualClock::new(0)));

    let runtime = Arc::new(Runtime::new(services, SchedulerConfig::default()));
    let loader = ModuleLoader::new(runtime.clone(), names, settings);
    (runtime, loader)
}

#[test]
fn test_missing_directory_loads_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let (runtime, mut loader) = loader(LoaderSettings::new(temp_dir.path().join("scripts")));

    assert_eq!(loader.load_all(), 0);
    assert!(loader.is_empty());
    assert_eq!(runtime.scheduler().script_count(), 0);
}

#[test]
fn test_invalid_module_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.so");
    File::create(&path)
        .unwrap()
        .write_all(b"this is not a shared library")
        .unwrap();
    File::create(temp_dir.path().join("notes.txt")).unwrap();

    let (runtime, mut loader) = loader(LoaderSettings::new(temp_dir.path()));

    assert_eq!(loader.load_all(), 0);
    assert_eq!(runtime.scheduler().script_count(), 0);

    let err = loader.load_file(&path).unwrap_err();
    assert!(matches!(err, LoadError::Open { .. }));
    assert!(err.to_string().contains("broken.so"));
}

#[test]
fn test_disabled_module_is_not_opened() {
    let temp_dir = TempDir::new().unwrap();
    File::create(temp_dir.path().join("broken.so"))
        .unwrap()
        .write_all(b"garbage")
        .unwrap();

    let mut settings = LoaderSettings::new(temp_dir.path());
    settings.disabled.insert("broken".to_string());
    let (_runtime, mut loader) = loader(settings);

    assert_eq!(loader.load_all(), 0);
    assert!(loader.modules().is_empty());
}

#[test]
fn test_unload_unknown_module() {
    let temp_dir = TempDir::new().unwrap();
    let (_runtime, mut loader) = loader(LoaderSettings::new(temp_dir.path()));

    assert!(!loader.unload(scriptvisor_host::ModuleId::from_raw(42)));
    assert_eq!(loader.reload_all(), 0);
}

/// The `scriptvisor-script-hello` cdylib built alongside this test
fn built_hello_module() -> PathBuf {
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap();
    let prefix = format!("{}scriptvisor_script_hello", DLL_PREFIX);

    [deps, deps.parent().unwrap()]
        .iter()
        .filter_map(|dir| fs::read_dir(dir).ok())
        .flat_map(|entries| entries.flatten())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&prefix) && name.ends_with(DLL_SUFFIX))
        })
        .max_by_key(|path| fs::metadata(path).and_then(|m| m.modified()).ok())
        .expect("scriptvisor-script-hello was not built")
}

/// Copy the hello module into `dir` as `hello.<ext>`
fn install_hello(dir: &Path) -> PathBuf {
    let path = dir.join(format!("hello.{}", DLL_EXTENSION));
    fs::copy(built_hello_module(), &path).unwrap();
    path
}

/// Open the same module the loader opens; the OS hands back the same handle
fn open_same(path: &Path) -> (Library, ModuleId) {
    #[cfg(unix)]
    use libloading::os::unix::Library as OsLibrary;
    #[cfg(windows)]
    use libloading::os::windows::Library as OsLibrary;

    let library = unsafe { Library::new(path) }.unwrap();
    let handle = OsLibrary::from(library).into_raw();
    let library = Library::from(unsafe { OsLibrary::from_raw(handle) });
    (library, ModuleId::from_raw(handle as usize))
}

fn hello_runs(library: &Library) -> u32 {
    let runs = unsafe { library.get::<extern "C" fn() -> u32>(b"hello_runs") }.unwrap();
    runs()
}

extern "C-unwind" fn registered_by_module() {}

#[test]
fn test_real_module_load_tick_unload() {
    let temp_dir = TempDir::new().unwrap();
    let path = install_hello(temp_dir.path());
    let names = Arc::new(ModuleNameMap::new());
    let (runtime, mut loader) =
        loader_with_names(LoaderSettings::new(temp_dir.path()), names.clone());

    assert_eq!(loader.load_all(), 1);
    let (id, name) = loader.modules()[0].clone();
    assert_eq!(name, "hello");

    let (library, handle) = open_same(&path);
    assert_eq!(id, handle);
    assert_eq!(names.module_name(id).as_deref(), Some("hello"));
    assert_eq!(runtime.scheduler().unit(id).unwrap().name(), "hello");

    runtime.tick();
    assert_eq!(hello_runs(&library), 1);
    assert_eq!(runtime.scheduler().unit(id).unwrap().status(), UnitStatus::Finished);

    assert!(loader.unload(id));
    assert!(loader.is_empty());
    assert_eq!(runtime.scheduler().script_count(), 0);
    assert_eq!(names.module_name(id), None);
}

#[test]
fn test_module_that_registered_itself_is_kept() {
    let temp_dir = TempDir::new().unwrap();
    let path = install_hello(temp_dir.path());
    let (runtime, mut loader) = loader(LoaderSettings::new(temp_dir.path()));

    // What a module's load-time initialiser does with its own handle
    let (_library, handle) = open_same(&path);
    assert!(runtime.register_script(handle, registered_by_module));

    assert_eq!(loader.load_file(&path).unwrap(), handle);
    assert_eq!(runtime.scheduler().script_count(), 1);
    assert!(runtime.scheduler().unit(handle).unwrap().runs(registered_by_module));

    assert!(loader.unload(handle));
    assert_eq!(runtime.scheduler().script_count(), 0);
}

#[test]
fn test_module_without_entry_symbol() {
    let temp_dir = TempDir::new().unwrap();
    let path = install_hello(temp_dir.path());
    let mut settings = LoaderSettings::new(temp_dir.path());
    settings.entry_symbol = "NoSuchEntry".to_string();
    let (runtime, mut loader) = loader(settings);

    let err = loader.load_file(&path).unwrap_err();
    assert!(matches!(err, LoadError::MissingEntry { .. }));
    assert!(loader.is_empty());
    assert_eq!(runtime.scheduler().script_count(), 0);

    // A module that registered itself needs no entry symbol
    let (_library, handle) = open_same(&path);
    runtime.register_script(handle, registered_by_module);
    assert_eq!(loader.load_file(&path).unwrap(), handle);
    assert_eq!(loader.len(), 1);

    loader.unload_all();
    assert_eq!(runtime.scheduler().script_count(), 0);
}

#[test]
fn test_unload_drops_module_key_handlers() {
    extern "C-unwind" fn on_key(_: u32, _: u16, _: u8, _: i32, _: i32, _: i32, _: i32) {}

    let temp_dir = TempDir::new().unwrap();
    install_hello(temp_dir.path());
    let (runtime, mut loader) = loader(LoaderSettings::new(temp_dir.path()));

    assert_eq!(loader.load_all(), 1);
    let (id, _) = loader.modules()[0].clone();
    runtime.keyboard().register_for(Some(id), on_key);

    assert_eq!(loader.reload_all(), 1);
    assert!(runtime.keyboard().is_empty());
}
