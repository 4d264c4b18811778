use std::collections::HashMap;
use std::path::{Path, PathBuf};

use revolve_domain::{ProjectId, Resource, ResourceDependency};
use revolve_graph::{validate, GraphError, ResolvedGraph};
use serde_json::Value;
use tracing::debug;

use crate::error::ConfigError;
use crate::interpolate::{extract_resource_refs, resolve_template};
use crate::raw::RawDocument;

/// Everything `load_config` produces from a document directory: the
/// resources it declared, the cross-resource dependency edges extracted
/// from `${kind.name.attr}` references, and the validated topological
/// ordering `revolve-graph` computed over them.
#[derive(Debug)]
pub struct LoadedConfig {
    pub resources: Vec<Resource>,
    pub dependencies: Vec<ResourceDependency>,
    pub graph: ResolvedGraph,
}

/// Recursively walks `dir` collecting every `*.yml`/`*.yaml` file, merges
/// their `locals`/`resources` blocks into one document, resolves
/// `${local.x}`/`${file(...)}` placeholders, extracts `${kind.name.attr}`
/// cross-resource references as dependency edges, and validates the
/// resulting graph for cycles before returning.
///
/// Grounded on `nclav-config::loader::load_enclaves`'s recursive directory
/// walk, flattened here since this crate has no enclave/partition
/// hierarchy to preserve — every document in the tree contributes to one
/// flat resource set.
pub fn load_config(dir: &Path) -> Result<LoadedConfig, ConfigError> {
    let mut documents = Vec::new();
    collect_documents(dir, &mut documents)?;

    let mut locals: HashMap<String, Value> = HashMap::new();
    let mut project: Option<String> = None;
    let mut raw_resources: Vec<(PathBuf, String, String, Value, Option<String>)> = Vec::new();

    for (path, doc) in documents {
        if let Some(provider) = doc.provider {
            project = Some(provider.project);
        }
        locals.extend(doc.locals);
        for block in doc.resources {
            raw_resources.push((path.clone(), block.kind, block.name, block.config, block.desired_state));
        }
    }

    let project_id = project
        .map(ProjectId::new)
        .ok_or_else(|| ConfigError::Conversion { path: dir.display().to_string(), message: "no provider.project declared in any document".to_string() })?;

    // Pass 1: interpolate locals/files and build the hcl_slug -> Resource map.
    let mut resources = Vec::new();
    let mut slug_to_id = HashMap::new();
    for (path, kind, name, config, desired_state) in &raw_resources {
        let interpolated = interpolate_load_time(config, &path.display().to_string(), &locals, dir)?;
        let hcl_slug = format!("{kind}.{name}");
        let mut resource = Resource::new(project_id.clone(), kind.clone(), hcl_slug.clone(), interpolated);
        if let Some(ds) = desired_state {
            resource.desired_state = parse_desired_state(ds, &path.display().to_string())?;
        }
        slug_to_id.insert(hcl_slug, resource.id.clone());
        resources.push(resource);
    }

    // Pass 2: extract cross-resource refs now that every slug has a resource id.
    let mut dependencies = Vec::new();
    for (resource, (path, _, _, raw_config, _)) in resources.iter().zip(raw_resources.iter()) {
        for (dep_kind, dep_name) in extract_resource_refs(raw_config) {
            let dep_slug = format!("{dep_kind}.{dep_name}");
            let depends_on = slug_to_id.get(&dep_slug).cloned().ok_or_else(|| ConfigError::Conversion {
                path: path.display().to_string(),
                message: format!("'{}' references undeclared resource '{dep_slug}'", resource.hcl_slug),
            })?;
            dependencies.push(ResourceDependency { resource_id: resource.id.clone(), depends_on });
        }
    }

    let graph = validate(&resources, &dependencies).map_err(map_graph_error)?;

    Ok(LoadedConfig { resources, dependencies, graph })
}

fn collect_documents(dir: &Path, out: &mut Vec<(PathBuf, RawDocument)>) -> Result<(), ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::Io { path: dir.display().to_string(), source: e })?;
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::Io { path: dir.display().to_string(), source: e })?;
        let path = entry.path();
        if path.is_dir() {
            collect_documents(&path, out)?;
            continue;
        }
        let is_yaml = path.extension().and_then(|e| e.to_str()).map(|e| e == "yml" || e == "yaml").unwrap_or(false);
        if !is_yaml {
            continue;
        }
        debug!(path = %path.display(), "loading config document");
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io { path: path.display().to_string(), source: e })?;
        let doc: RawDocument = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse { path: path.display().to_string(), source: e })?;
        out.push((path, doc));
    }
    Ok(())
}

/// Resolves only the statically-known placeholder forms (`local.`/`file()`)
/// at load time; `${kind.name.attr}` tokens are left verbatim in the stored
/// config for the engine to resolve against an upstream resource's observed
/// attributes once that resource actually exists — this crate only proves
/// such a reference is declared and acyclic, it does not know the value.
fn interpolate_load_time(value: &Value, path: &str, locals: &HashMap<String, Value>, base_dir: &Path) -> Result<Value, ConfigError> {
    match value {
        Value::String(s) => {
            if !s.contains("${") {
                return Ok(value.clone());
            }
            let empty = HashMap::new();
            match resolve_template(s, path, locals, &empty, base_dir) {
                Ok(resolved) => Ok(Value::String(resolved)),
                Err(ConfigError::Interpolation { .. }) => Ok(value.clone()), // defer cross-resource refs
                Err(other) => Err(other),
            }
        }
        Value::Array(items) => {
            let resolved = items.iter().map(|v| interpolate_load_time(v, path, locals, base_dir)).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(resolved))
        }
        Value::Object(map) => {
            let mut resolved = serde_json::Map::new();
            for (k, v) in map {
                resolved.insert(k.clone(), interpolate_load_time(v, path, locals, base_dir)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

fn parse_desired_state(raw: &str, path: &str) -> Result<revolve_domain::DesiredState, ConfigError> {
    use revolve_domain::DesiredState;
    match raw {
        "healthy" => Ok(DesiredState::Healthy),
        "deleted" => Ok(DesiredState::Deleted),
        "updated" => Ok(DesiredState::Updated),
        "untracked" => Ok(DesiredState::Untracked),
        other => Err(ConfigError::Conversion { path: path.to_string(), message: format!("unknown desired_state '{other}'") }),
    }
}

fn map_graph_error(e: GraphError) -> ConfigError {
    ConfigError::Graph(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_doc(dir: &Path, name: &str, contents: &str) {
        let path = dir.join(name);
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn loads_resources_and_resolves_locals() {
        let dir = tempfile_dir();
        write_doc(
            dir.path(),
            "main.yml",
            r#"
provider:
  project: demo-project
locals:
  vpc_cidr: "10.0.0.0/16"
resources:
  - kind: vpc_network
    name: main
    config:
      cidr: "${local.vpc_cidr}"
"#,
        );

        let loaded = load_config(dir.path()).unwrap();
        assert_eq!(loaded.resources.len(), 1);
        assert_eq!(loaded.resources[0].config["cidr"], "10.0.0.0/16");
        assert_eq!(loaded.resources[0].hcl_slug, "vpc_network.main");
    }

    #[test]
    fn extracts_cross_resource_dependency_edge() {
        let dir = tempfile_dir();
        write_doc(
            dir.path(),
            "main.yml",
            r#"
provider:
  project: demo-project
resources:
  - kind: vpc_network
    name: main
    config: {}
  - kind: firewall
    name: allow-ssh
    config:
      network: "${vpc_network.main.self_link}"
"#,
        );

        let loaded = load_config(dir.path()).unwrap();
        assert_eq!(loaded.dependencies.len(), 1);
        let firewall = loaded.resources.iter().find(|r| r.kind == "firewall").unwrap();
        let network = loaded.resources.iter().find(|r| r.kind == "vpc_network").unwrap();
        assert_eq!(loaded.dependencies[0].resource_id, firewall.id);
        assert_eq!(loaded.dependencies[0].depends_on, network.id);
        // Unresolved cross-resource token is left intact for the engine.
        assert_eq!(firewall.config["network"], "${vpc_network.main.self_link}");
    }

    #[test]
    fn reference_to_undeclared_resource_is_an_error() {
        let dir = tempfile_dir();
        write_doc(
            dir.path(),
            "main.yml",
            r#"
provider:
  project: demo-project
resources:
  - kind: firewall
    name: allow-ssh
    config:
      network: "${vpc_network.missing.self_link}"
"#,
        );

        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Conversion { .. }));
    }

    fn tempfile_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }
}
