use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{JimakuError, Result};
use crate::event::{AppEvent, EventBus};
use crate::style::{Style, StylePatch};

/// Owns the active style and the named presets. Presets live in memory and as
/// one JSON file per name under the presets directory; the directory is read
/// once at construction.
#[derive(Clone)]
pub struct StyleManager {
    state: Arc<Mutex<StyleState>>,
    bus: EventBus,
}

struct StyleState {
    style: Style,
    presets: HashMap<String, Style>,
    presets_dir: PathBuf,
}

impl StyleManager {
    pub fn new(bus: EventBus, presets_dir: PathBuf) -> Self {
        let presets = hydrate_presets(&presets_dir);
        Self {
            state: Arc::new(Mutex::new(StyleState {
                style: Style::default(),
                presets,
                presets_dir,
            })),
            bus,
        }
    }

    pub fn style(&self) -> Style {
        self.state.lock().style.clone()
    }

    /// Merges the present fields of the patch into the active style. Notifies
    /// once when anything actually changed.
    pub fn update(&self, patch: &StylePatch) {
        let snapshot = {
            let mut state = self.state.lock();
            if !state.style.apply(patch) {
                debug!("Style update changed nothing");
                return;
            }
            Arc::new(state.style.clone())
        };
        self.bus.publish(AppEvent::StyleChanged(snapshot));
    }

    /// Wholesale replacement, used by project load. Publishes both the change
    /// and the load notification so presentation layers can re-hydrate
    /// controls, not just re-render.
    pub fn restore_from_record(&self, style: Style) {
        let snapshot = {
            let mut state = self.state.lock();
            state.style = style;
            Arc::new(state.style.clone())
        };
        self.bus.publish(AppEvent::StyleChanged(Arc::clone(&snapshot)));
        self.bus.publish(AppEvent::StyleLoaded(snapshot));
    }

    pub fn reset_to_default(&self) {
        debug!("Resetting style to default");
        self.restore_from_record(Style::default());
    }

    /// Persists the active style under the name. Overwrites silently; last
    /// write wins.
    pub fn save_preset(&self, name: &str) -> Result<()> {
        let (style, path) = {
            let state = self.state.lock();
            (state.style.clone(), preset_path(&state.presets_dir, name))
        };

        let json = serde_json::to_string_pretty(&style)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, json)
            .map_err(|e| JimakuError::Persistence(format!("Failed to save preset: {}", e)))?;
        info!("Preset '{}' saved to {}", name, path.display());

        self.state.lock().presets.insert(name.to_string(), style);
        Ok(())
    }

    /// Replaces the active style with the named preset.
    pub fn load_preset(&self, name: &str) -> Result<()> {
        let style = {
            let state = self.state.lock();
            state
                .presets
                .get(name)
                .cloned()
                .ok_or_else(|| JimakuError::PresetNotFound(name.to_string()))?
        };
        info!("Preset '{}' loaded", name);
        self.restore_from_record(style);
        Ok(())
    }

    pub fn delete_preset(&self, name: &str) -> Result<()> {
        let path = {
            let mut state = self.state.lock();
            if state.presets.remove(name).is_none() {
                return Err(JimakuError::PresetNotFound(name.to_string()));
            }
            preset_path(&state.presets_dir, name)
        };

        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(JimakuError::Persistence(format!(
                "Failed to delete preset file: {}",
                e
            ))),
        }
    }

    pub fn list_presets(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().presets.keys().cloned().collect();
        names.sort();
        names
    }
}

fn preset_path(presets_dir: &Path, name: &str) -> PathBuf {
    presets_dir.join(format!("{}.json", name))
}

/// Reads every `*.json` in the presets directory. Unreadable files are
/// skipped with a warning, never fatal at startup.
fn hydrate_presets(presets_dir: &Path) -> HashMap<String, Style> {
    let mut presets = HashMap::new();
    if !presets_dir.exists() {
        return presets;
    }

    for entry in WalkDir::new(presets_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        match fs::read_to_string(path).map_err(JimakuError::Io).and_then(|raw| {
            serde_json::from_str::<Style>(&raw).map_err(JimakuError::Json)
        }) {
            Ok(style) => {
                presets.insert(name, style);
            }
            Err(e) => warn!("Skipping unreadable preset {}: {}", path.display(), e),
        }
    }

    debug!("Hydrated {} style presets", presets.len());
    presets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn manager() -> (StyleManager, EventBus, TempDir) {
        let dir = TempDir::new().unwrap();
        let bus = EventBus::new();
        let manager = StyleManager::new(bus.clone(), dir.path().to_path_buf());
        (manager, bus, dir)
    }

    fn count_events(bus: &EventBus, kind: EventKind) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = Arc::clone(&count);
            bus.subscribe(kind, move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        count
    }

    #[test]
    fn test_update_notifies_only_on_change() {
        let (manager, bus, _dir) = manager();
        let changed = count_events(&bus, EventKind::StyleChanged);

        let patch = StylePatch {
            font: Some("Arial".to_string()),
            ..StylePatch::default()
        };
        manager.update(&patch);
        assert_eq!(changed.load(Ordering::SeqCst), 1);
        assert_eq!(manager.style().font, "Arial");

        // Same values again: no change, no notification
        manager.update(&patch);
        assert_eq!(changed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_preset_overwrite_is_last_write_wins() {
        let (manager, _bus, _dir) = manager();

        manager.update(&StylePatch {
            font_size: Some(40),
            ..StylePatch::default()
        });
        manager.save_preset("mine").unwrap();

        manager.update(&StylePatch {
            font_size: Some(90),
            ..StylePatch::default()
        });
        manager.save_preset("mine").unwrap();

        manager.reset_to_default();
        manager.load_preset("mine").unwrap();
        assert_eq!(manager.style().font_size, 90);
    }

    #[test]
    fn test_load_unknown_preset_fails() {
        let (manager, _bus, _dir) = manager();
        assert!(matches!(
            manager.load_preset("missing"),
            Err(JimakuError::PresetNotFound(_))
        ));
    }

    #[test]
    fn test_presets_survive_a_restart_via_files() {
        let dir = TempDir::new().unwrap();
        {
            let manager = StyleManager::new(EventBus::new(), dir.path().to_path_buf());
            manager.update(&StylePatch {
                font: Some("Georgia".to_string()),
                ..StylePatch::default()
            });
            manager.save_preset("georgia").unwrap();
        }

        let reborn = StyleManager::new(EventBus::new(), dir.path().to_path_buf());
        assert_eq!(reborn.list_presets(), vec!["georgia".to_string()]);
        reborn.load_preset("georgia").unwrap();
        assert_eq!(reborn.style().font, "Georgia");
    }

    #[test]
    fn test_delete_preset_removes_name_and_file() {
        let (manager, _bus, dir) = manager();
        manager.save_preset("gone").unwrap();
        assert!(dir.path().join("gone.json").exists());

        manager.delete_preset("gone").unwrap();
        assert!(manager.list_presets().is_empty());
        assert!(!dir.path().join("gone.json").exists());
        assert!(manager.delete_preset("gone").is_err());
    }

    #[test]
    fn test_restore_publishes_changed_and_loaded() {
        let (manager, bus, _dir) = manager();
        let changed = count_events(&bus, EventKind::StyleChanged);
        let loaded = count_events(&bus, EventKind::StyleLoaded);

        let mut style = Style::default();
        style.font_size = 33;
        manager.restore_from_record(style);

        assert_eq!(changed.load(Ordering::SeqCst), 1);
        assert_eq!(loaded.load(Ordering::SeqCst), 1);
        assert_eq!(manager.style().font_size, 33);
    }
}
