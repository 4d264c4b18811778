use revolve_domain::{Phase, Resource, ResourceEvent, ResourceEventType, ResourceState, TransitionEventType};

/// The static specificity-ordered table driving resource state projection.
/// Ported verbatim from `EVENT_SIDE_EFFECTS` in `resources/__init__.py`:
/// entries are matched most-specific-first by `decide_next_state`.
const EVENT_SIDE_EFFECTS: &[(Option<Phase>, ResourceEventType, Option<&str>, ResourceState)] = &[
    (
        Some(Phase::EnsureExists),
        ResourceEventType::ResourceFound,
        Some("found_before_creation"),
        ResourceState::Exists,
    ),
    (
        Some(Phase::EnsureExists),
        ResourceEventType::ResourceFound,
        Some("found_after_creation"),
        ResourceState::Exists,
    ),
    (
        Some(Phase::EnsureExists),
        ResourceEventType::TerminalFailure,
        Some("creation_request_failed"),
        ResourceState::CreationTerminated,
    ),
    (
        Some(Phase::EnsureExists),
        ResourceEventType::TerminalFailure,
        Some("resource_not_found"),
        ResourceState::CreationTerminated,
    ),
    (
        Some(Phase::EnsureHealthy),
        ResourceEventType::HealthChecksSucceeded,
        None,
        ResourceState::Healthy,
    ),
    (
        Some(Phase::EnsureHealthy),
        ResourceEventType::HealthChecksTerminated,
        None,
        ResourceState::Unhealthy,
    ),
    (
        Some(Phase::EnsureDeleted),
        ResourceEventType::DeletionTerminated,
        None,
        ResourceState::DeletionTerminated,
    ),
    (
        Some(Phase::EnsureDeleted),
        ResourceEventType::ResourceNotFound,
        None,
        ResourceState::Deleted,
    ),
    (
        Some(Phase::Test),
        ResourceEventType::TerminalFailure,
        Some("creation_request_failed"),
        ResourceState::CreationTerminated,
    ),
    (
        None,
        ResourceEventType::ResourceFoundAndHealthy,
        None,
        ResourceState::Healthy,
    ),
    (
        Some(Phase::EnsureDependenciesReady),
        ResourceEventType::TerminalFailure,
        None,
        ResourceState::CreationTerminated,
    ),
    (
        Some(Phase::EnsureExists),
        ResourceEventType::TerminalFailure,
        None,
        ResourceState::CreationTerminated,
    ),
    (
        Some(Phase::EnsureHealthy),
        ResourceEventType::TerminalFailure,
        None,
        ResourceState::CreationTerminated,
    ),
];

/// Decides the resource's next `state` from the most specific matching key,
/// in order `(phase, event, reason) > (phase, event) > event`. Ported from
/// `decide_next_state_from_event`. Returns `None` when nothing matches,
/// meaning `state` is left unchanged — "unmatched events do not change
/// state".
pub fn decide_next_state(
    phase: Option<Phase>,
    event_type: ResourceEventType,
    reason: Option<&str>,
) -> Option<ResourceState> {
    if let Some(r) = reason {
        if let Some(&(_, _, _, state)) = EVENT_SIDE_EFFECTS
            .iter()
            .find(|(p, e, rs, _)| *p == phase && *e == event_type && rs.as_deref() == Some(r))
        {
            return Some(state);
        }
    }

    if let Some(&(_, _, _, state)) = EVENT_SIDE_EFFECTS
        .iter()
        .find(|(p, e, rs, _)| *p == phase && *e == event_type && rs.is_none())
    {
        return Some(state);
    }

    EVENT_SIDE_EFFECTS
        .iter()
        .find(|(p, e, rs, _)| p.is_none() && *e == event_type && rs.is_none())
        .map(|&(_, _, _, state)| state)
}

/// Applies one `ResourceEvent` to `resource`: updates the fine-grained
/// `existence`/`health` facts unconditionally (ported from
/// `log_activity_on_resource`, which runs regardless of whether the
/// projector table has a `state` entry for this event), then updates
/// `state` only if the table has a match. This is the resource's only
/// mutation path — there is no parallel side channel, which resolves the
/// original's design note (i) about `state` being set from two places.
pub fn project_event(resource: &mut Resource, event: &ResourceEvent) {
    resource.apply_fine_grained_event(event.event_type);

    if let Some(next) = decide_next_state(event.phase, event.event_type, event.reason.as_deref()) {
        resource.state = next;
        resource.updated_at = chrono::Utc::now();
    }
}

/// The transition status FSM's event table: `sent_to_broker→sent_to_broker`,
/// `started→in_progress`, `succeeded→succeeded`, `terminal_failure→failed`.
/// Ported from `EVENT_STATUS_SIDE_EFFECTS` in `transitions/models.py`.
/// Unmatched events (e.g. `retrying`, `rescheduled`) leave `status`
/// unchanged.
pub fn decide_next_status(event_type: TransitionEventType) -> Option<revolve_domain::TransitionStatus> {
    use revolve_domain::TransitionStatus;
    match event_type {
        TransitionEventType::Started => Some(TransitionStatus::InProgress),
        TransitionEventType::Succeeded => Some(TransitionStatus::Succeeded),
        TransitionEventType::Failed => Some(TransitionStatus::Failed),
        TransitionEventType::Rescheduled => Some(TransitionStatus::SentToBroker),
        TransitionEventType::Retrying
        | TransitionEventType::DuplicateDetected
        | TransitionEventType::HardTimeout => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revolve_domain::{ProjectId, TransitionId};
    use serde_json::json;

    #[test]
    fn most_specific_key_wins() {
        let state = decide_next_state(
            Some(Phase::EnsureExists),
            ResourceEventType::ResourceFound,
            Some("found_before_creation"),
        );
        assert_eq!(state, Some(ResourceState::Exists));
    }

    #[test]
    fn falls_back_to_phase_event_pair_without_reason_match() {
        let state = decide_next_state(Some(Phase::EnsureHealthy), ResourceEventType::HealthChecksSucceeded, None);
        assert_eq!(state, Some(ResourceState::Healthy));
    }

    #[test]
    fn falls_back_to_bare_event_type() {
        let state = decide_next_state(Some(Phase::EnsureHealthy), ResourceEventType::ResourceFoundAndHealthy, None);
        assert_eq!(state, Some(ResourceState::Healthy));
    }

    #[test]
    fn unmatched_event_leaves_state_unchanged() {
        let state = decide_next_state(Some(Phase::EnsureDependenciesReady), ResourceEventType::DependenciesPending, None);
        assert_eq!(state, None);
    }

    #[test]
    fn projector_is_deterministic() {
        let a = decide_next_state(Some(Phase::EnsureExists), ResourceEventType::TerminalFailure, Some("resource_not_found"));
        let b = decide_next_state(Some(Phase::EnsureExists), ResourceEventType::TerminalFailure, Some("resource_not_found"));
        assert_eq!(a, b);
    }

    #[test]
    fn project_event_updates_existence_even_without_state_match() {
        let mut r = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
        let ev = ResourceEvent::new(r.id.clone(), None, Some(Phase::EnsureExists), ResourceEventType::ResourceFound, None);
        let before = r.state;
        project_event(&mut r, &ev);
        assert_eq!(r.existence, revolve_domain::Existence::Exists);
        assert_eq!(r.state, before);
    }

    #[test]
    fn project_event_updates_state_and_fine_grained_facts_together() {
        let mut r = Resource::new(ProjectId::new("p"), "vpc_network", "net-a", json!({}));
        let ev = ResourceEvent::new(
            r.id.clone(),
            Some(TransitionId::generate()),
            Some(Phase::EnsureHealthy),
            ResourceEventType::HealthChecksSucceeded,
            None,
        );
        project_event(&mut r, &ev);
        assert_eq!(r.state, ResourceState::Healthy);
        assert_eq!(r.health, revolve_domain::Health::Healthy);
    }

    #[test]
    fn transition_status_table_matches_spec() {
        use revolve_domain::TransitionStatus;
        assert_eq!(decide_next_status(TransitionEventType::Started), Some(TransitionStatus::InProgress));
        assert_eq!(decide_next_status(TransitionEventType::Succeeded), Some(TransitionStatus::Succeeded));
        assert_eq!(decide_next_status(TransitionEventType::Failed), Some(TransitionStatus::Failed));
        assert_eq!(decide_next_status(TransitionEventType::Retrying), None);
    }
}
