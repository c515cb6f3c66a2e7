use kube::runtime::events::{Event, EventType};

pub trait ResourceEvent {
    fn to_event(&self, attribute: Option<String>) -> Event;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GrafanaEventEnum {
    Reconciling,
    InSync,
    Failed,
    StepFailed,
    LegacyCleanupFailed,
    Deleting,
}

impl ResourceEvent for GrafanaEventEnum {
    fn to_event(&self, attribute: Option<String>) -> Event {
        match self {
            GrafanaEventEnum::Reconciling => Event {
                type_: EventType::Normal,
                reason: "Reconciling".to_string(),
                note: Some("Reconciling the Grafana monitoring stack".to_owned()),
                action: "Starting the first reconciliation pass".to_string(),
                secondary: None,
            },
            GrafanaEventEnum::InSync => Event {
                type_: EventType::Normal,
                reason: "InSync".to_string(),
                note: Some("Grafana monitoring stack matches its specification".to_owned()),
                action: "Reconciliation pass finished".to_string(),
                secondary: None,
            },
            GrafanaEventEnum::Failed => Event {
                type_: EventType::Warning,
                reason: "Failed".to_string(),
                note: Some(format!("Reconciliation failed: {}", attribute.unwrap_or_default())),
                action: "Reconciliation pass aborted".to_string(),
                secondary: None,
            },
            GrafanaEventEnum::StepFailed => Event {
                type_: EventType::Warning,
                reason: "StepFailed".to_string(),
                note: Some(attribute.unwrap_or("A reconciliation step failed".to_owned())),
                action: "Continuing with the next step".to_string(),
                secondary: None,
            },
            GrafanaEventEnum::LegacyCleanupFailed => Event {
                type_: EventType::Warning,
                reason: "LegacyCleanupFailed".to_string(),
                note: Some(format!("Could not delete legacy resources: {}", attribute.unwrap_or_default())),
                action: "Cleanup retried on the next pass".to_string(),
                secondary: None,
            },
            GrafanaEventEnum::Deleting => Event {
                type_: EventType::Normal,
                reason: "Deleting".to_string(),
                note: Some("Grafana monitoring stack is being deleted".to_owned()),
                action: "Removing resources the garbage collector cannot reach".to_string(),
                secondary: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_events_carry_attribute() {
        let event = GrafanaEventEnum::StepFailed.to_event(Some("Step dashboards failed".to_owned()));
        assert_eq!(event.type_, EventType::Warning);
        assert_eq!(event.note.as_deref(), Some("Step dashboards failed"));
        let event = GrafanaEventEnum::Failed.to_event(Some("boom".to_owned()));
        assert_eq!(event.note.as_deref(), Some("Reconciliation failed: boom"));
    }

    #[test]
    fn test_normal_events() {
        assert_eq!(GrafanaEventEnum::InSync.to_event(None).type_, EventType::Normal);
        assert_eq!(GrafanaEventEnum::Deleting.to_event(None).reason, "Deleting");
    }
}
