use k8s_openapi::{
    api::{core::v1::ServiceAccount, networking::v1::Ingress},
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::{
    artifacts::ArtifactRenderer,
    cluster_store::{self, ClusterStore},
    constants,
    events::GrafanaEventEnum,
    grafana::{
        grafana_certificate::{self, Certificate},
        grafana_configmaps, grafana_dashboard,
        grafana_deployment::{self, WorkloadHashes},
        grafana_ingress,
        grafana_resource::Grafana,
        grafana_scc, grafana_secret, grafana_service, grafana_service_account, legacy_cleanup,
    },
    model::{Error, ReconcileStep},
    operator_config::OperatorConfig,
    utils,
};

/// Outcome of a pass whose fatal steps all succeeded
#[derive(Debug, Default)]
pub struct PassReport {
    /// Errors of the best-effort steps, the pass is reported as failed when not empty
    pub soft_failures: Vec<Error>,
    /// Legacy resources that could not be deleted, never fail the pass
    pub cleanup_failures: Vec<Error>,
}

impl PassReport {
    pub fn is_success(&self) -> bool {
        self.soft_failures.is_empty()
    }

    /// Joined messages of the soft failures
    pub fn failure_message(&self) -> String {
        self.soft_failures.iter().map(|error| error.to_string()).collect::<Vec<String>>().join("; ")
    }
}

/// Runs the ordered reconciliation steps of a Grafana instance against a cluster store
pub struct GrafanaReconciler<'a, S: ClusterStore> {
    store: &'a S,
    config: &'a OperatorConfig,
    renderer: &'a ArtifactRenderer,
}

struct PassContext<'a> {
    grafana: &'a Grafana,
    name: String,
    namespace: String,
    labels: BTreeMap<String, String>,
    owner_references: Option<Vec<OwnerReference>>,
}

impl<'a, S: ClusterStore> GrafanaReconciler<'a, S> {
    pub fn new(store: &'a S, config: &'a OperatorConfig, renderer: &'a ArtifactRenderer) -> Self {
        GrafanaReconciler { store, config, renderer }
    }

    /// Runs one pass. Fatal step failures abort the pass and are returned as `Error::StepFailed`,
    /// best-effort failures are collected in the report.
    pub async fn reconcile(&self, grafana: &Grafana) -> Result<PassReport, Error> {
        let namespace = grafana
            .namespace()
            .ok_or(Error::UserInputError("Expected a namespaced Grafana resource".to_owned()))?;
        let name = grafana.name_any();
        let pass = PassContext {
            grafana,
            labels: utils::grafana_labels(&name),
            owner_references: grafana.controller_owner_ref(&()).map(|owner| vec![owner]),
            name,
            namespace,
        };
        let mut report = PassReport::default();

        let result = self.reconcile_identity(&pass).await;
        self.run_step(&pass, &mut report, ReconcileStep::SecurityPolicy, result).await?;
        let result = self.reconcile_config_bundles(&pass).await;
        let config_hash = self.run_step(&pass, &mut report, ReconcileStep::ConfigBundles, result).await?.unwrap_or_default();

        let result = self.reconcile_certificates(&pass).await;
        self.run_step(&pass, &mut report, ReconcileStep::Certificates, result).await?;

        let ds_proxy_hash = self.reconcile_ds_proxy(&pass, &mut report).await?;

        let result = self.reconcile_service(&pass).await;
        self.run_step(&pass, &mut report, ReconcileStep::NetworkExposure, result).await?;
        let result = self.reconcile_ingress(&pass).await;
        self.run_step(&pass, &mut report, ReconcileStep::NetworkExposure, result).await?;

        let admin_secret = grafana_secret::build_admin_secret(&grafana.spec, &pass.namespace, pass.labels.clone(), pass.owner_references.clone());
        let result = grafana_secret::reconcile_admin_secret(self.store, &admin_secret).await;
        self.run_step(&pass, &mut report, ReconcileStep::AdminSecret, result).await?;

        let hashes = WorkloadHashes { config: config_hash, ds_proxy: ds_proxy_hash };
        let result = self.reconcile_workload(&pass, &hashes).await;
        self.run_step(&pass, &mut report, ReconcileStep::Workload, result).await?;

        let result = grafana_dashboard::reconcile_dashboards(
            self.store,
            &grafana.spec,
            &pass.name,
            &pass.namespace,
            &pass.labels,
            pass.owner_references.clone(),
        )
        .await;
        self.run_step(&pass, &mut report, ReconcileStep::Dashboards, result).await?;

        report.cleanup_failures = legacy_cleanup::cleanup_legacy_resources(self.store, &pass.namespace)
            .await
            .into_iter()
            .map(|error| Error::step(ReconcileStep::LegacyCleanup, error))
            .collect();
        if !report.cleanup_failures.is_empty() {
            let message = report.cleanup_failures.iter().map(|error| error.to_string()).collect::<Vec<String>>().join("; ");
            self.publish(pass.grafana, GrafanaEventEnum::LegacyCleanupFailed, Some(message)).await;
        }

        info!(namespace = %pass.namespace, name = %pass.name, soft_failures = report.soft_failures.len(), "Reconciliation pass finished");
        Ok(report)
    }

    /// Fatal steps and builder errors abort the pass. Any other failure is published as an event,
    /// recorded in the report, and yields `None`.
    async fn run_step<T>(&self, pass: &PassContext<'_>, report: &mut PassReport, step: ReconcileStep, result: Result<T, Error>) -> Result<Option<T>, Error> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(error) if step.is_fatal() || error.is_builder_error() => Err(Error::step(step, error)),
            Err(error) => {
                let error = Error::step(step, error);
                warn!(namespace = %pass.namespace, name = %pass.name, %step, "{error}");
                self.publish(pass.grafana, GrafanaEventEnum::StepFailed, Some(error.to_string())).await;
                report.soft_failures.push(error);
                Ok(None)
            }
        }
    }

    async fn publish(&self, grafana: &Grafana, event: GrafanaEventEnum, attribute: Option<String>) {
        if let Err(error) = self.store.publish_event(grafana, event, attribute).await {
            warn!("Could not publish event {:?} for {}: {error}", event, grafana.name_any());
        }
    }

    async fn reconcile_identity(&self, pass: &PassContext<'_>) -> Result<(), Error> {
        let service_account_name = grafana_service_account::service_account_name(&pass.grafana.spec);
        if self.config.platform.security_policy {
            let policy = grafana_scc::build_security_policy(&pass.namespace, &service_account_name);
            cluster_store::apply(self.store, &policy).await?;
            debug!("Security policy {} registered", constants::GRAFANA_SCC_NAME);
        }
        let service_account: ServiceAccount =
            grafana_service_account::build_service_account(&pass.grafana.spec, &pass.namespace, pass.labels.clone(), pass.owner_references.clone());
        cluster_store::apply(self.store, &service_account).await?;
        Ok(())
    }

    /// Returns the aggregate hash of the bundles
    async fn reconcile_config_bundles(&self, pass: &PassContext<'_>) -> Result<String, Error> {
        let bundles = grafana_configmaps::build_config_bundles(&pass.grafana.spec, &pass.namespace, self.config, self.renderer)?;
        for bundle in bundles.iter() {
            grafana_configmaps::reconcile_config_map(self.store, bundle, &pass.namespace, pass.labels.clone(), pass.owner_references.clone()).await?;
        }
        Ok(grafana_configmaps::aggregate_hash(&bundles))
    }

    /// Certificates are only created, rotation belongs to the issuer
    async fn reconcile_certificates(&self, pass: &PassContext<'_>) -> Result<(), Error> {
        for name in grafana_certificate::certificate_secret_names(&pass.grafana.spec) {
            if self.store.get::<Certificate>(Some(&pass.namespace), &name).await?.is_some() {
                debug!("Certificate {name} already requested");
                continue;
            }
            let certificate =
                grafana_certificate::build_certificate(&name, &pass.namespace, &pass.grafana.spec, pass.labels.clone(), pass.owner_references.clone());
            match self.store.create(&certificate).await {
                Ok(_) => info!("Certificate {name} requested"),
                Err(error) if cluster_store::is_conflict(&error) => debug!("Certificate {name} requested concurrently"),
                Err(error) => return Err(error.into()),
            }
        }
        Ok(())
    }

    /// Rendering failures abort the pass, store failures only mark it as failed.
    /// The hash of the desired bundle is returned in both cases.
    async fn reconcile_ds_proxy(&self, pass: &PassContext<'_>, report: &mut PassReport) -> Result<String, Error> {
        let result = grafana_secret::build_ds_proxy_secret(
            &pass.grafana.spec,
            &pass.namespace,
            self.config,
            self.renderer,
            pass.labels.clone(),
            pass.owner_references.clone(),
        );
        let Some(desired) = self.run_step(pass, report, ReconcileStep::DatasourceProxy, result).await? else {
            return Ok(String::new());
        };
        let desired_hash = desired.as_ref().map(|(_, hash)| hash.to_owned()).unwrap_or_default();
        let result = grafana_secret::reconcile_ds_proxy_secret(self.store, &pass.namespace, desired).await;
        self.run_step(pass, report, ReconcileStep::DatasourceProxy, result).await?;
        Ok(desired_hash)
    }

    async fn reconcile_service(&self, pass: &PassContext<'_>) -> Result<(), Error> {
        let service = grafana_service::build_service(&pass.grafana.spec, &pass.namespace, pass.labels.clone(), pass.owner_references.clone());
        cluster_store::apply(self.store, &service).await?;
        Ok(())
    }

    async fn reconcile_ingress(&self, pass: &PassContext<'_>) -> Result<(), Error> {
        if grafana_ingress::ingress_enabled(&pass.grafana.spec) {
            let ingress = grafana_ingress::build_ingress(&pass.grafana.spec, &pass.namespace, pass.labels.clone(), pass.owner_references.clone());
            cluster_store::apply(self.store, &ingress).await?;
        } else if self.store.delete::<Ingress>(Some(&pass.namespace), constants::GRAFANA_NAME).await? {
            info!("Ingress {} deleted", constants::GRAFANA_NAME);
        }
        Ok(())
    }

    async fn reconcile_workload(&self, pass: &PassContext<'_>, hashes: &WorkloadHashes) -> Result<(), Error> {
        let deployment = grafana_deployment::build_deployment(
            &pass.grafana.spec,
            &pass.namespace,
            self.config,
            hashes,
            pass.labels.clone(),
            pass.owner_references.clone(),
        );
        let outcome = cluster_store::apply(self.store, &deployment).await?;
        debug!("Deployment {} reconciled: {:?}", constants::GRAFANA_NAME, outcome);
        Ok(())
    }
}
