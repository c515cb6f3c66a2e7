use std::fmt::{Display, Formatter};

/// All errors possible to occur during reconciliation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Any error originating from the `kube-rs` crate
    #[error("Kubernetes reported error: {source}")]
    KubeError {
        #[from]
        source: kube::Error,
    },
    /// Error in user input or Grafana resource definition, typically malformed fields.
    #[error("Invalid Grafana CRD: {0}")]
    UserInputError(String),

    /// A parameterized artifact could not be rendered
    #[error("Template rendering error: {0}")]
    TemplateError(
        #[from]
        minijinja::Error,
    ),

    #[error("YAML Parsing error: {0}")]
    ParserError(
        #[from]
        serde_yaml::Error,
    ),

    #[error("JSON serialization error: {0}")]
    SerializationError(
        #[from]
        serde_json::Error,
    ),

    /// Certificate material required by the datasource document is missing or unreadable
    #[error("Could not read TLS material {path}: {source}")]
    TlsMaterialError {
        path: String,
        source: std::io::Error,
    },

    /// The operator configuration is invalid
    #[error("Invalid operator configuration: {0}")]
    ConfigError(String),

    /// A reconciliation step failed
    #[error("Step {step} failed: {source}")]
    StepFailed {
        step: ReconcileStep,
        source: Box<Error>,
    },
}

impl Error {
    pub fn step(step: ReconcileStep, source: Error) -> Self {
        Error::StepFailed { step, source: Box::new(source) }
    }

    /// Errors raised while building a desired artifact, as opposed to writing it
    pub fn is_builder_error(&self) -> bool {
        matches!(
            self,
            Error::TemplateError(_) | Error::TlsMaterialError { .. } | Error::ParserError(_) | Error::SerializationError(_)
        )
    }
}

/// Ordered steps executed during a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileStep {
    SecurityPolicy,
    ConfigBundles,
    Certificates,
    DatasourceProxy,
    NetworkExposure,
    AdminSecret,
    Workload,
    Dashboards,
    LegacyCleanup,
}

impl ReconcileStep {
    /// Fatal steps abort the pass at their first error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReconcileStep::SecurityPolicy | ReconcileStep::ConfigBundles | ReconcileStep::AdminSecret | ReconcileStep::Workload
        )
    }
}

impl Display for ReconcileStep {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ReconcileStep::SecurityPolicy => write!(f, "security-policy"),
            ReconcileStep::ConfigBundles => write!(f, "config-bundles"),
            ReconcileStep::Certificates => write!(f, "certificates"),
            ReconcileStep::DatasourceProxy => write!(f, "datasource-proxy"),
            ReconcileStep::NetworkExposure => write!(f, "network-exposure"),
            ReconcileStep::AdminSecret => write!(f, "admin-secret"),
            ReconcileStep::Workload => write!(f, "workload"),
            ReconcileStep::Dashboards => write!(f, "dashboards"),
            ReconcileStep::LegacyCleanup => write!(f, "legacy-cleanup"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_steps() {
        let fatal: Vec<ReconcileStep> = [
            ReconcileStep::SecurityPolicy,
            ReconcileStep::ConfigBundles,
            ReconcileStep::Certificates,
            ReconcileStep::DatasourceProxy,
            ReconcileStep::NetworkExposure,
            ReconcileStep::AdminSecret,
            ReconcileStep::Workload,
            ReconcileStep::Dashboards,
            ReconcileStep::LegacyCleanup,
        ]
        .into_iter()
        .filter(|step| step.is_fatal())
        .collect();
        assert_eq!(
            fatal,
            vec![ReconcileStep::SecurityPolicy, ReconcileStep::ConfigBundles, ReconcileStep::AdminSecret, ReconcileStep::Workload]
        );
    }

    #[test]
    fn test_builder_errors() {
        let tls = Error::TlsMaterialError { path: "/tls/ca.crt".to_owned(), source: std::io::Error::from(std::io::ErrorKind::NotFound) };
        assert!(tls.is_builder_error());
        let template = Error::from(minijinja::Error::new(minijinja::ErrorKind::UndefinedError, "missing"));
        assert!(template.is_builder_error());
        assert!(!Error::UserInputError("bad port".to_owned()).is_builder_error());
        assert!(!Error::step(ReconcileStep::Workload, tls).is_builder_error());
    }

    #[test]
    fn test_step_error_message() {
        let error = Error::step(ReconcileStep::Workload, Error::UserInputError("bad port".to_owned()));
        assert_eq!(error.to_string(), "Step workload failed: Invalid Grafana CRD: bad port");
    }
}
