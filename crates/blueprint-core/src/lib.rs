pub mod governance;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use governance::{
    enrich_diagram, GovernanceSummary, GroupEntry, PolicyAssignmentRef, PreflightReport,
    RoleAssignmentRef, ScopeRecord, GROUP_NODE_TYPE,
};

// --- Storage ---
//
// Public functions operate on the global directory; the `_in` variants take
// an explicit base directory so callers and tests can target any location.

/// Resolve the global diagrams directory (~/.blueprint/).
pub fn diagrams_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".blueprint")
}

fn diagram_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.bpd", name))
}

/// List all diagram names (without .bpd extension), sorted.
pub fn list_diagrams() -> Result<Vec<String>, String> {
    list_diagrams_in(&diagrams_dir())
}

fn list_diagrams_in(dir: &Path) -> Result<Vec<String>, String> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut names: Vec<String> = fs::read_dir(dir)
        .map_err(|e| e.to_string())?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name().to_string_lossy().to_string();
            name.strip_suffix(".bpd").map(|n| n.to_string())
        })
        .collect();
    names.sort();
    Ok(names)
}

/// Read a diagram as a raw JSON string.
pub fn read_diagram_raw(name: &str) -> Result<String, String> {
    read_diagram_raw_in(&diagrams_dir(), name)
}

fn read_diagram_raw_in(dir: &Path, name: &str) -> Result<String, String> {
    fs::read_to_string(diagram_path(dir, name)).map_err(|e| e.to_string())
}

/// Read a diagram as a JSON value. Diagrams are schema-tolerant: unknown
/// fields are preserved, so they are handled as `serde_json::Value` rather
/// than a closed struct.
pub fn read_diagram(name: &str) -> Result<serde_json::Value, String> {
    read_diagram_in(&diagrams_dir(), name)
}

fn read_diagram_in(dir: &Path, name: &str) -> Result<serde_json::Value, String> {
    let raw = read_diagram_raw_in(dir, name)?;
    serde_json::from_str(&raw).map_err(|e| e.to_string())
}

/// Write a diagram from a raw JSON string.
///
/// Uses atomic write (temp file + rename) so external file watchers see a
/// single event instead of truncate + write.
pub fn write_diagram_raw(name: &str, data: &str) -> Result<(), String> {
    write_diagram_raw_in(&diagrams_dir(), name, data)
}

fn write_diagram_raw_in(dir: &Path, name: &str, data: &str) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    let tmp = dir.join(format!(".{}.bpd.tmp", name));
    let path = diagram_path(dir, name);
    fs::write(&tmp, data).map_err(|e| e.to_string())?;
    fs::rename(&tmp, &path).map_err(|e| e.to_string())
}

/// Write a diagram from a JSON value.
pub fn write_diagram(name: &str, diagram: &serde_json::Value) -> Result<(), String> {
    write_diagram_in(&diagrams_dir(), name, diagram)
}

fn write_diagram_in(dir: &Path, name: &str, diagram: &serde_json::Value) -> Result<(), String> {
    let json = serde_json::to_string_pretty(diagram).map_err(|e| e.to_string())?;
    write_diagram_raw_in(dir, name, &json)
}

/// Delete a diagram by name. Deleting a diagram that does not exist is fine.
pub fn delete_diagram(name: &str) -> Result<(), String> {
    delete_diagram_in(&diagrams_dir(), name)
}

fn delete_diagram_in(dir: &Path, name: &str) -> Result<(), String> {
    let path = diagram_path(dir, name);
    if path.exists() {
        fs::remove_file(&path).map_err(|e| e.to_string())
    } else {
        Ok(())
    }
}

// --- AI Settings ---

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
}

fn settings_path(dir: &Path) -> PathBuf {
    dir.join("settings.json")
}

pub fn read_settings() -> AiSettings {
    read_settings_in(&diagrams_dir())
}

fn read_settings_in(dir: &Path) -> AiSettings {
    let path = settings_path(dir);
    if !path.exists() {
        return AiSettings::default();
    }
    fs::read_to_string(&path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn write_settings(settings: &AiSettings) -> Result<(), String> {
    write_settings_in(&diagrams_dir(), settings)
}

fn write_settings_in(dir: &Path, settings: &AiSettings) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(settings).map_err(|e| e.to_string())?;
    fs::write(settings_path(dir), json).map_err(|e| e.to_string())
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn scratch_dir() -> PathBuf {
        static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        let seq = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        std::env::temp_dir().join(format!("blueprint-core-test-{}-{}", std::process::id(), seq))
    }

    #[test]
    fn diagram_write_read_list_delete_round_trip() {
        let dir = scratch_dir();
        let diagram = json!({
            "nodes": [{"id": "vnet1", "type": "azure.group", "data": {"groupType": "virtualNetwork"}}],
            "edges": [],
        });

        write_diagram_in(&dir, "landing-zone", &diagram).unwrap();
        write_diagram_in(&dir, "alpha", &json!({"nodes": [], "edges": []})).unwrap();

        assert_eq!(
            list_diagrams_in(&dir).unwrap(),
            vec!["alpha", "landing-zone"]
        );
        assert_eq!(read_diagram_in(&dir, "landing-zone").unwrap(), diagram);

        // no leftover temp files from the atomic write
        assert!(!dir.join(".landing-zone.bpd.tmp").exists());

        delete_diagram_in(&dir, "alpha").unwrap();
        assert_eq!(list_diagrams_in(&dir).unwrap(), vec!["landing-zone"]);
        // deleting a missing diagram is not an error
        delete_diagram_in(&dir, "alpha").unwrap();

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn list_skips_non_diagram_files_and_handles_missing_dir() {
        let dir = scratch_dir();
        assert_eq!(list_diagrams_in(&dir).unwrap(), Vec::<String>::new());

        fs::create_dir_all(&dir).unwrap();
        fs::write(settings_path(&dir), "{}").unwrap();
        fs::write(diagram_path(&dir, "prod"), "{}").unwrap();
        assert_eq!(list_diagrams_in(&dir).unwrap(), vec!["prod"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn settings_round_trip_and_default_when_absent() {
        let dir = scratch_dir();
        assert_eq!(read_settings_in(&dir).provider, "");

        let settings = AiSettings {
            provider: "ollama".to_string(),
            api_key: String::new(),
            model: "llama3".to_string(),
        };
        write_settings_in(&dir, &settings).unwrap();

        let back = read_settings_in(&dir);
        assert_eq!(back.provider, "ollama");
        assert_eq!(back.model, "llama3");
        assert!(ai_configured(&back));

        let _ = fs::remove_dir_all(&dir);
    }
}
