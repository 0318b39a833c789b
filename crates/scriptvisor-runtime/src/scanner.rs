//! Module file change detection for hot reloading
//!
//! Polls the script directory and reports module files that were added,
//! modified or removed since the previous scan.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, warn};

use crate::loader::is_module_file;

/// Default scan interval (1000ms = 1Hz)
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(1000);

/// Result of scanning for module changes
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Modules that were modified (path and new modification time)
    pub changed: Vec<(PathBuf, SystemTime)>,
    /// Modules that appeared in the directory
    pub added: Vec<PathBuf>,
    /// Modules that disappeared from the directory
    pub removed: Vec<PathBuf>,
}

impl ScanResult {
    pub fn has_changes(&self) -> bool {
        !self.changed.is_empty() || !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Scanner for detecting module file changes
pub struct ModuleScanner {
    script_dir: PathBuf,
    extensions: Vec<String>,
    scan_interval: Duration,
    last_scan: Option<Instant>,
    /// path -> modification time as of the last scan
    cached_state: HashMap<PathBuf, SystemTime>,
}

impl ModuleScanner {
    pub fn new(script_dir: PathBuf, extensions: Vec<String>) -> Self {
        Self::with_interval(script_dir, extensions, DEFAULT_SCAN_INTERVAL)
    }

    /// The files present now form the baseline; they are not reported as added
    pub fn with_interval(script_dir: PathBuf, extensions: Vec<String>, scan_interval: Duration) -> Self {
        let cached_state = Self::modules_in_dir(&script_dir, &extensions);

        Self {
            script_dir,
            extensions,
            scan_interval,
            last_scan: None,
            cached_state,
        }
    }

    /// Check if enough time has elapsed since the last scan
    pub fn should_scan(&self) -> bool {
        match self.last_scan {
            Some(last) => last.elapsed() >= self.scan_interval,
            None => true,
        }
    }

    /// Scan the directory, update the cache and return what changed
    pub fn scan_changes(&mut self) -> ScanResult {
        self.last_scan = Some(Instant::now());

        debug!(
            target: "scripting",
            "Scanning script directory for changes: {}",
            self.script_dir.display()
        );

        let current_state = Self::modules_in_dir(&self.script_dir, &self.extensions);
        let mut result = ScanResult::default();

        for (path, modified_time) in &current_state {
            match self.cached_state.get(path) {
                Some(cached_time) if cached_time != modified_time => {
                    debug!(
                        target: "scripting",
                        "Module changed: {} (old: {:?}, new: {:?})",
                        path.display(),
                        cached_time,
                        modified_time
                    );
                    result.changed.push((path.clone(), *modified_time));
                }
                Some(_) => {}
                None => {
                    debug!(target: "scripting", "Module added: {}", path.display());
                    result.added.push(path.clone());
                }
            }
        }

        for path in self.cached_state.keys() {
            if !current_state.contains_key(path) {
                debug!(target: "scripting", "Module removed: {}", path.display());
                result.removed.push(path.clone());
            }
        }

        self.cached_state = current_state;
        result
    }

    /// Forget the baseline and take the directory as it is now
    pub fn rebaseline(&mut self) {
        self.cached_state = Self::modules_in_dir(&self.script_dir, &self.extensions);
    }

    pub fn known_modules(&self) -> usize {
        self.cached_state.len()
    }

    fn modules_in_dir(script_dir: &Path, extensions: &[String]) -> HashMap<PathBuf, SystemTime> {
        let mut modules = HashMap::new();

        if !script_dir.exists() {
            debug!(
                target: "scripting",
                "Script directory does not exist: {}",
                script_dir.display()
            );
            return modules;
        }

        let entries = match std::fs::read_dir(script_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    target: "scripting",
                    "Failed to read script directory {}: {}",
                    script_dir.display(),
                    e
                );
                return modules;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();

            if !is_module_file(&path, extensions) {
                continue;
            }

            match std::fs::metadata(&path).and_then(|metadata| metadata.modified()) {
                Ok(modified_time) => {
                    modules.insert(path, modified_time);
                }
                Err(e) => {
                    warn!(
                        target: "scripting",
                        "Failed to get modification time for {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        modules
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn set_scan_interval(&mut self, interval: Duration) {
        self.scan_interval = interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    fn extensions() -> Vec<String> {
        vec!["asi".to_string(), "so".to_string()]
    }

    #[test]
    fn test_should_scan_timing() {
        let temp_dir = TempDir::new().unwrap();
        let mut scanner = ModuleScanner::with_interval(
            temp_dir.path().to_path_buf(),
            extensions(),
            Duration::from_millis(50),
        );

        assert!(scanner.should_scan());
        scanner.scan_changes();
        assert!(!scanner.should_scan());

        std::thread::sleep(Duration::from_millis(60));
        assert!(scanner.should_scan());
    }

    #[test]
    fn test_existing_modules_are_baseline() {
        let temp_dir = TempDir::new().unwrap();
        File::create(temp_dir.path().join("trainer.asi")).unwrap();

        let mut scanner = ModuleScanner::new(temp_dir.path().to_path_buf(), extensions());
        assert_eq!(scanner.known_modules(), 1);
        assert!(!scanner.scan_changes().has_changes());
    }

    #[test]
    fn test_detect_new_module() {
        let temp_dir = TempDir::new().unwrap();
        let mut scanner = ModuleScanner::new(temp_dir.path().to_path_buf(), extensions());

        let path = temp_dir.path().join("trainer.asi");
        File::create(&path).unwrap().write_all(b"not really a module").unwrap();

        let result = scanner.scan_changes();
        assert_eq!(result.added, vec![path]);
        assert!(result.changed.is_empty());
        assert!(result.removed.is_empty());
    }

    #[test]
    fn test_detect_modified_module() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("trainer.asi");
        File::create(&path).unwrap().write_all(b"initial").unwrap();

        let mut scanner = ModuleScanner::new(temp_dir.path().to_path_buf(), extensions());

        // Push the timestamp forward so filesystems with coarse mtimes see it
        let later = SystemTime::now() + Duration::from_secs(5);
        let file = File::options().write(true).open(&path).unwrap();
        file.set_modified(later).unwrap();

        let result = scanner.scan_changes();
        assert_eq!(result.changed.len(), 1);
        assert_eq!(result.changed[0].0, path);
        assert!(result.added.is_empty());
    }

    #[test]
    fn test_detect_removed_module() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("libhello.so");
        File::create(&path).unwrap();

        let mut scanner = ModuleScanner::new(temp_dir.path().to_path_buf(), extensions());
        fs::remove_file(&path).unwrap();

        let result = scanner.scan_changes();
        assert_eq!(result.removed, vec![path]);
        assert_eq!(scanner.known_modules(), 0);
    }

    #[test]
    fn test_ignores_other_files() {
        let temp_dir = TempDir::new().unwrap();
        let mut scanner = ModuleScanner::new(temp_dir.path().to_path_buf(), extensions());

        File::create(temp_dir.path().join("readme.txt")).unwrap();
        File::create(temp_dir.path().join("trainer.ini")).unwrap();

        assert!(!scanner.scan_changes().has_changes());
    }

    #[test]
    fn test_handles_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut scanner = ModuleScanner::new(temp_dir.path().join("missing"), extensions());

        assert!(!scanner.scan_changes().has_changes());
        assert_eq!(scanner.known_modules(), 0);
    }
}
