use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::error::ConfigError;

/// Scans a string for `${ ... }` placeholders and resolves each one.
///
/// Three forms are supported:
/// - `${local.<key>}` — looked up in `locals`
/// - `${file(<path>)}` — file contents read relative to `base_dir`
/// - `${<kind>.<name>.<attr>}` — cross-resource attribute reference, looked
///   up in `resource_outputs` keyed by `"<kind>.<name>"`
///
/// Grounded on `resolve_template` in `nclav-reconciler/src/reconcile.rs`: a
/// manual scan-and-splice loop rather than a templating crate, generalized
/// here from two placeholder forms to three.
pub fn resolve_template(
    template: &str,
    path: &str,
    locals: &HashMap<String, Value>,
    resource_outputs: &HashMap<String, Value>,
    base_dir: &Path,
) -> Result<String, ConfigError> {
    let mut result = template.to_string();
    let mut search_start = 0;
    loop {
        let Some(start) = result[search_start..].find("${") else { break };
        let abs_start = search_start + start;
        let Some(end) = result[abs_start..].find('}') else { break };
        let abs_end = abs_start + end + 1;

        let inner = result[abs_start + 2..abs_end - 1].trim();
        let resolved = resolve_token(inner, path, locals, resource_outputs, base_dir)?;

        result = format!("{}{}{}", &result[..abs_start], resolved, &result[abs_end..]);
        search_start = abs_start + resolved.len();
    }
    Ok(result)
}

fn resolve_token(
    token: &str,
    path: &str,
    locals: &HashMap<String, Value>,
    resource_outputs: &HashMap<String, Value>,
    base_dir: &Path,
) -> Result<String, ConfigError> {
    if let Some(key) = token.strip_prefix("local.") {
        return locals
            .get(key)
            .map(value_to_interpolated_string)
            .ok_or_else(|| ConfigError::Interpolation {
                path: path.to_string(),
                message: format!("undefined local '{key}'"),
            });
    }

    if let Some(inner) = token.strip_prefix("file(").and_then(|s| s.strip_suffix(')')) {
        let rel = inner.trim().trim_matches('"');
        let file_path = base_dir.join(rel);
        return std::fs::read_to_string(&file_path)
            .map(|s| s.trim_end().to_string())
            .map_err(|e| ConfigError::Io { path: file_path.display().to_string(), source: e });
    }

    let parts: Vec<&str> = token.splitn(3, '.').collect();
    if parts.len() == 3 {
        let (kind, name, attr) = (parts[0], parts[1], parts[2]);
        let key = format!("{kind}.{name}");
        let resolved = resource_outputs
            .get(&key)
            .and_then(|outputs| outputs.get(attr))
            .map(value_to_interpolated_string);
        if let Some(val) = resolved {
            return Ok(val);
        }
        return Err(ConfigError::Interpolation {
            path: path.to_string(),
            message: format!("undefined reference '{token}'"),
        });
    }

    Err(ConfigError::Interpolation { path: path.to_string(), message: format!("malformed interpolation token '{token}'") })
}

fn value_to_interpolated_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Walks a resource's declared config recursively, collecting every
/// `${<kind>.<name>.<attr>}` cross-resource reference found in string
/// values. `local.`/`file(...)` tokens are not dependency edges — only
/// cross-resource references are, since those are what `revolve-graph`
/// needs to topologically order resource creation.
pub fn extract_resource_refs(config: &Value) -> Vec<(String, String)> {
    let mut refs = Vec::new();
    collect_refs(config, &mut refs);
    refs
}

fn collect_refs(value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::String(s) => collect_refs_in_string(s, out),
        Value::Array(items) => items.iter().for_each(|v| collect_refs(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_refs(v, out)),
        _ => {}
    }
}

fn collect_refs_in_string(s: &str, out: &mut Vec<(String, String)>) {
    let mut search_start = 0;
    loop {
        let Some(start) = s[search_start..].find("${") else { break };
        let abs_start = search_start + start;
        let Some(end) = s[abs_start..].find('}') else { break };
        let abs_end = abs_start + end + 1;

        let inner = s[abs_start + 2..abs_end - 1].trim();
        if !inner.starts_with("local.") && !inner.starts_with("file(") {
            let parts: Vec<&str> = inner.splitn(3, '.').collect();
            if parts.len() == 3 {
                out.push((parts[0].to_string(), parts[1].to_string()));
            }
        }
        search_start = abs_end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_local_reference() {
        let mut locals = HashMap::new();
        locals.insert("cidr".to_string(), json!("10.0.0.0/16"));
        let resolved = resolve_template("${local.cidr}", "doc.yml", &locals, &HashMap::new(), Path::new(".")).unwrap();
        assert_eq!(resolved, "10.0.0.0/16");
    }

    #[test]
    fn resolves_cross_resource_attribute() {
        let mut outputs = HashMap::new();
        outputs.insert("vpc_network.main".to_string(), json!({"self_link": "projects/p/vpc/main"}));
        let resolved = resolve_template(
            "${vpc_network.main.self_link}",
            "doc.yml",
            &HashMap::new(),
            &outputs,
            Path::new("."),
        )
        .unwrap();
        assert_eq!(resolved, "projects/p/vpc/main");
    }

    #[test]
    fn undefined_local_is_an_error() {
        let err = resolve_template("${local.missing}", "doc.yml", &HashMap::new(), &HashMap::new(), Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Interpolation { .. }));
    }

    #[test]
    fn extracts_cross_resource_refs_and_ignores_locals() {
        let config = json!({
            "cidr": "${local.cidr}",
            "network": "${vpc_network.main.self_link}",
            "nested": ["${firewall.allow_ssh.id}"],
        });
        let refs = extract_resource_refs(&config);
        assert_eq!(refs.len(), 2);
        assert!(refs.contains(&("vpc_network".to_string(), "main".to_string())));
        assert!(refs.contains(&("firewall".to_string(), "allow_ssh".to_string())));
    }
}
