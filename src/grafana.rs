pub mod grafana_certificate;
pub mod grafana_config;
pub mod grafana_configmaps;
pub mod grafana_dashboard;
pub mod grafana_datasource;
pub mod grafana_deployment;
pub mod grafana_deployment_spec;
pub mod grafana_ingress;
pub mod grafana_resource;
pub mod grafana_scc;
pub mod grafana_secret;
pub mod grafana_service;
pub mod grafana_service_account;
pub mod legacy_cleanup;
