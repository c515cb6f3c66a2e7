// Operator Constants
pub const RECONCILE_FREQUENCY: u64 = 10;
pub const OPERATOR_ENVIRONMENT: &str = "OPERATOR_ENVIRONMENT";
pub const OPERATOR_FINALIZER: &str = "grafanas.operator.ibm.com/finalizer";
pub const OPERATOR_REPORTER: &str = "ibm-monitoring-grafana-operator";

// Annotations
pub const ANNOTATION_LAST_CONFIG: &str = "lastConfig";
pub const ANNOTATION_CONFIG_HASH: &str = "grafana.operator.ibm.com/config-hash";
pub const ANNOTATION_DS_PROXY_HASH: &str = "grafana.operator.ibm.com/dsproxy-hash";

// Labels
pub const LABEL_KUBERNETES_COMPONENT: &str = "app.kubernetes.io/component";
pub const LABEL_KUBERNETES_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_KUBERNETES_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_KUBERNETES_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
pub const LABEL_APP: &str = "app";
pub const LABEL_COMPONENT: &str = "component";
pub const LABEL_OWNER_NAME: &str = "grafana.operator.ibm.com/owner-name";
pub const LABEL_OWNER_NAMESPACE: &str = "grafana.operator.ibm.com/owner-namespace";

// Resource names
pub const GRAFANA_NAME: &str = "ibm-monitoring-grafana";
pub const GRAFANA_APP: &str = "grafana";
pub const GRAFANA_HTTP_PORT_NAME: &str = "grafana";
pub const GRAFANA_ADMIN_SECRET_NAME: &str = "grafana-secret";
pub const GRAFANA_ADMIN_USER_KEY: &str = "username";
pub const GRAFANA_ADMIN_PASSWORD_KEY: &str = "password";
pub const GRAFANA_DEFAULT_ADMIN_USER: &str = "admin";
pub const GRAFANA_DEFAULT_ADMIN_PASSWORD: &str = "admin";
pub const GRAFANA_SCC_NAME: &str = "ibm-monitoring-grafana-scc";
pub const DS_PROXY_SECRET_NAME: &str = "grafana-ds-proxy-config";
pub const DS_PROXY_CONFIG_KEY: &str = "dsproxy-config.yaml";
pub const DS_PROXY_LISTEN_ADDRESS: &str = "127.0.0.1:9096";
pub const DEFAULT_TLS_SECRET_NAME: &str = "ibm-monitoring-certs";
pub const DEFAULT_TLS_CLIENT_SECRET_NAME: &str = "ibm-monitoring-client-certs";
pub const DEFAULT_ISSUER_NAME: &str = "cs-ca-clusterissuer";
pub const DEFAULT_ISSUER_KIND: &str = "ClusterIssuer";
pub const CERTIFICATE_COMMON_NAME: &str = "ibm-monitoring";

// Config bundles
pub const CM_GRAFANA_LUA: &str = "grafana-lua-script-config";
pub const CM_UTIL_LUA: &str = "grafana-util-lua-script-config";
pub const CM_ROUTER_CONFIG: &str = "grafana-router-config";
pub const CM_ROUTER_ENTRY: &str = "grafana-router-entry";
pub const CM_CRD_ENTRY: &str = "grafana-crd-entry";
pub const CM_DEFAULT_DASHBOARDS: &str = "grafana-default-dashboards";
pub const CM_DS_ENTRY: &str = "grafana-ds-entry-config";
pub const CM_GRAFANA_CONFIG: &str = "grafana-config";
pub const CM_DASHBOARD_CONFIG: &str = "grafana-dashboard-config";
pub const CM_DATASOURCE: &str = "grafana-datasource";

// Kubernetes Specs
pub const DEFAULT_CLUSTER_PORT: i32 = 8443;
pub const GRAFANA_PORT: i32 = 3000;
pub const PROMETHEUS_PORT: i32 = 9090;
pub const CLUSTER_DOMAIN: &str = "cluster.local";
pub const GRAFANA_HEALTH_ENDPOINT: &str = "/api/health";
pub const DEFAULT_INGRESS_PATH: &str = "/grafana";
pub const DEFAULT_THANOS_URL: &str = "https://thanos-querier.openshift-monitoring.svc:9091";
pub const DEFAULT_PROMETHEUS_SERVICE: &str = "ibm-monitoring-prometheus";

// Images
pub const IMAGE_DIGEST_MARKER: &str = "@sha256";
pub const DEFAULT_GRAFANA_IMAGE: &str = "quay.io/opencloudio/grafana";
pub const DEFAULT_GRAFANA_IMAGE_TAG: &str = "v6.5.2-build.1";
pub const DEFAULT_ROUTER_IMAGE: &str = "quay.io/opencloudio/icp-management-ingress";
pub const DEFAULT_ROUTER_IMAGE_TAG: &str = "2.5.0";
pub const DEFAULT_DASHBOARD_CTL_IMAGE: &str = "quay.io/opencloudio/dashboard-controller";
pub const DEFAULT_DASHBOARD_CTL_IMAGE_TAG: &str = "v1.2.0-build.2";
pub const DEFAULT_INIT_IMAGE: &str = "quay.io/opencloudio/icp-initcontainer";
pub const DEFAULT_INIT_IMAGE_TAG: &str = "1.0.0-build.2";
pub const DEFAULT_DS_PROXY_IMAGE: &str = "quay.io/opencloudio/grafana-ocpthanos-proxy";
pub const DEFAULT_DS_PROXY_IMAGE_TAG: &str = "1.0.0";

// Image overrides read from the operator environment
pub const ENV_GRAFANA_IMAGE: &str = "GRAFANA_IMAGE";
pub const ENV_GRAFANA_IMAGE_TAG: &str = "GRAFANA_IMAGE_TAG";
pub const ENV_ROUTER_IMAGE: &str = "ROUTER_IMAGE";
pub const ENV_ROUTER_IMAGE_TAG: &str = "ROUTER_IMAGE_TAG";
pub const ENV_DASHBOARD_CTL_IMAGE: &str = "DASHBOARD_CTL_IMAGE";
pub const ENV_DASHBOARD_CTL_IMAGE_TAG: &str = "DASHBOARD_CTL_IMAGE_TAG";
pub const ENV_INIT_IMAGE: &str = "INIT_IMAGE";
pub const ENV_INIT_IMAGE_TAG: &str = "INIT_IMAGE_TAG";
pub const ENV_DS_PROXY_IMAGE: &str = "DS_PROXY_IMAGE";
pub const ENV_DS_PROXY_IMAGE_TAG: &str = "DS_PROXY_IMAGE_TAG";

// Base resources scaled by the per workload multiplier
pub const BASE_MEMORY_REQUEST_MI: i64 = 256;
pub const BASE_CPU_REQUEST_M: i64 = 200;
pub const BASE_MEMORY_LIMIT_MI: i64 = 512;
pub const BASE_CPU_LIMIT_M: i64 = 500;
