use revolve_domain::{DesiredState, Resource, Transition};

/// Render the result of an `hcl-apply` run as human-readable text.
pub fn render_apply_summary(resources: &[Resource], dependency_count: usize, desired_state: DesiredState) -> String {
    let mut out = String::new();
    out.push_str(&format!("Applied {} resource(s), desired_state={}\n", resources.len(), desired_state));
    for r in resources {
        out.push_str(&format!("  {} [{}] -> {}\n", r.hcl_slug, r.kind, r.state));
    }
    out.push_str(&format!("{dependency_count} dependency edge(s) recorded.\n"));
    out
}

/// Render a transition's state after a `do-transition` run.
pub fn render_transition(transition: &Transition) -> String {
    format!(
        "transition {} phase={} status={} attempt={}",
        transition.id, transition.phase, transition.status, transition.attempt,
    )
}
