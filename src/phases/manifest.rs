//! Writing the Composite Manifest
//!
//! A manifest run ends with `_service:snapcraft:snapcraft.yaml` in the output
//! directory: the top-level keys of the input configuration plus a `parts:`
//! mapping in which every part points at the directory its archive unpacks
//! to and lists the parts it builds after.
//!
//! The output is deterministic. Mapping keys are sorted at every level and
//! nothing run-dependent (timestamps, absolute paths) is included, so the
//! same configuration always yields the same bytes.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use log::info;
use serde_yaml::{Mapping, Value};

use crate::defaults;
use crate::error::{Error, Result};
use crate::generator::ManifestMeta;
use crate::task::{self, Task};

/// Renders the manifest for `tasks`.
pub fn render(meta: &ManifestMeta, tasks: &[Task]) -> Result<String> {
    let mut parts = Mapping::new();
    for task in tasks {
        parts.insert(Value::String(task.name.clone()), part_value(task, tasks));
    }

    let mut top: BTreeMap<String, Value> = meta.metadata.clone();
    top.insert("parts".to_string(), Value::Mapping(parts));

    let top = top
        .into_iter()
        .map(|(k, v)| (Value::String(k), v))
        .collect::<Mapping>();

    Ok(serde_yaml::to_string(&sorted(Value::Mapping(top)))?)
}

/// Writes the manifest into the manifest output directory.
pub fn write(meta: &ManifestMeta, tasks: &[Task]) -> Result<PathBuf> {
    let content = render(meta, tasks)?;
    let path = meta.outdir.join(defaults::MANIFEST_FILE);

    fs::create_dir_all(&meta.outdir)?;
    fs::write(&path, content).map_err(|e| {
        Error::packaging(format!("Failed to write manifest '{}': {}", path.display(), e))
    })?;

    info!("wrote manifest {}", path.display());
    Ok(path)
}

fn part_value(task: &Task, tasks: &[Task]) -> Value {
    let mut part = Mapping::new();
    for (k, v) in &task.extra {
        part.insert(Value::String(k.clone()), v.clone());
    }

    if let Some(plugin) = &task.plugin {
        part.insert(Value::String("plugin".into()), Value::String(plugin.clone()));
    }
    part.insert(
        Value::String("source".into()),
        Value::String(task.filename.clone()),
    );

    if !task.depends_on.is_empty() {
        let after = task
            .depends_on
            .iter()
            .map(|dep| {
                let name = task::find(tasks, dep).map_or(dep.as_str(), |t| t.name.as_str());
                Value::String(name.to_string())
            })
            .collect();
        part.insert(Value::String("after".into()), Value::Sequence(after));
    }

    Value::Mapping(part)
}

/// Rebuilds every mapping in `value` with its keys in sorted order.
fn sorted(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut entries: Vec<(Value, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| sort_key(a).cmp(&sort_key(b)));
            Value::Mapping(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, sorted(v)))
                    .collect(),
            )
        }
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(sorted).collect()),
        other => other,
    }
}

fn sort_key(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other).unwrap_or_default(),
    }
}
