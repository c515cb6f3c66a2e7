use std::collections::BTreeMap;

use crate::constants;
use crate::grafana::grafana_resource::{GrafanaIniConfig, GrafanaSpec};

/// An ini document whose sections and keys are kept sorted, so the rendering only depends
/// on the content and never on the order the entries were inserted in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IniDocument {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl IniDocument {
    #[cfg(test)]
    pub fn from_sections<I, E>(sections: I) -> Self
    where
        I: IntoIterator<Item = (String, E)>,
        E: IntoIterator<Item = (String, String)>,
    {
        let mut document = IniDocument::default();
        for (section, entries) in sections {
            for (key, value) in entries {
                document.set(&section, &key, value);
            }
        }
        document
    }

    pub fn set(&mut self, section: &str, key: &str, value: String) {
        self.sections.entry(section.to_owned()).or_default().insert(key.to_owned(), value);
    }

    fn set_opt(&mut self, section: &str, key: &str, value: Option<&String>) {
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            self.set(section, key, value.to_owned());
        }
    }

    fn set_bool(&mut self, section: &str, key: &str, value: Option<bool>) {
        if let Some(value) = value {
            self.set(section, key, value.to_string());
        }
    }

    #[cfg(test)]
    pub fn get(&self, section: &str, key: &str) -> Option<&String> {
        self.sections.get(section).and_then(|entries| entries.get(key))
    }

    pub fn render(&self) -> String {
        let mut rendered = String::new();
        for (section, entries) in &self.sections {
            rendered.push_str(&format!("[{}]\n", section));
            for (key, value) in entries {
                rendered.push_str(&format!("{} = {}\n", key, value));
            }
            rendered.push('\n');
        }
        rendered
    }
}

/// Returns the administrator user and password, falling back to the defaults
pub fn admin_credentials(spec: &GrafanaSpec) -> (String, String) {
    let security = spec.grafana_config.as_ref().and_then(|config| config.security.as_ref());
    let user = security
        .and_then(|security| security.admin_user.clone())
        .filter(|user| !user.is_empty())
        .unwrap_or(constants::GRAFANA_DEFAULT_ADMIN_USER.to_owned());
    let password = security
        .and_then(|security| security.admin_password.clone())
        .filter(|password| !password.is_empty())
        .unwrap_or(constants::GRAFANA_DEFAULT_ADMIN_PASSWORD.to_owned());
    (user, password)
}

fn default_document() -> IniDocument {
    let mut ini = IniDocument::default();
    ini.set("paths", "data", "/var/lib/grafana".to_owned());
    ini.set("paths", "logs", "/var/log/grafana".to_owned());
    ini.set("paths", "plugins", "/var/lib/grafana/plugins".to_owned());
    ini.set("paths", "provisioning", "/etc/grafana/provisioning".to_owned());

    // Grafana only listens on localhost, the router terminates external traffic
    ini.set("server", "protocol", "https".to_owned());
    ini.set("server", "domain", "127.0.0.1".to_owned());
    ini.set("server", "http_port", constants::GRAFANA_PORT.to_string());
    ini.set("server", "root_url", "%(protocol)s://%(domain)s:%(http_port)s/grafana".to_owned());
    ini.set("server", "cert_file", "/opt/ibm/monitoring/certs/tls.crt".to_owned());
    ini.set("server", "cert_key", "/opt/ibm/monitoring/certs/tls.key".to_owned());

    ini.set("users", "default_theme", "light".to_owned());
    ini.set("log", "mode", "console".to_owned());
    ini.set("security", "allow_embedding", "true".to_owned());
    ini.set("auth", "disable_login_form", "true".to_owned());
    ini.set("auth", "disable_signout_menu", "true".to_owned());
    ini.set("auth.proxy", "enabled", "true".to_owned());
    ini.set("auth.proxy", "header_name", "X-WEBAUTH-USER".to_owned());
    ini.set("auth.proxy", "header_property", "username".to_owned());
    ini.set("auth.proxy", "auto_sign_up", "false".to_owned());
    ini
}

fn apply_overrides(ini: &mut IniDocument, config: &GrafanaIniConfig) {
    if let Some(paths) = &config.paths {
        ini.set_opt("paths", "data", paths.data.as_ref());
        ini.set_opt("paths", "logs", paths.logs.as_ref());
        ini.set_opt("paths", "plugins", paths.plugins.as_ref());
        ini.set_opt("paths", "provisioning", paths.provisioning.as_ref());
    }
    if let Some(server) = &config.server {
        ini.set_opt("server", "http_port", server.http_port.as_ref());
        ini.set_opt("server", "root_url", server.root_url.as_ref());
    }
    if let Some(users) = &config.users {
        ini.set_opt("users", "default_theme", users.default_theme.as_ref());
    }
    if let Some(auth) = &config.auth {
        ini.set_bool("auth", "disable_login_form", auth.disable_login_form);
        ini.set_bool("auth", "disable_signout_menu", auth.disable_signout_menu);
    }
    if let Some(proxy) = &config.proxy {
        ini.set_bool("auth.proxy", "enabled", proxy.enabled);
        ini.set_opt("auth.proxy", "header_name", proxy.header_name.as_ref());
        ini.set_opt("auth.proxy", "header_property", proxy.header_property.as_ref());
        ini.set_bool("auth.proxy", "auto_sign_up", proxy.auto_sign_up);
    }
    if let Some(security) = &config.security {
        ini.set_bool("security", "allow_embedding", security.allow_embedding);
        ini.set_bool("security", "disable_initial_admin_creation", security.disable_initial_admin_creation);
    }
    if let Some(log) = &config.log {
        ini.set_opt("log", "mode", log.mode.as_ref());
        ini.set_opt("log", "level", log.level.as_ref());
        ini.set_opt("log", "filters", log.filters.as_ref());
    }
    if let Some(extra) = &config.extra {
        for (section, entries) in extra {
            for (key, value) in entries {
                ini.set(section, key, value.to_owned());
            }
        }
    }
}

/// Builds grafana.ini from the defaults overlaid with the spec sections
pub fn build_grafana_ini(spec: &GrafanaSpec) -> IniDocument {
    let mut ini = default_document();
    if let Some(config) = &spec.grafana_config {
        apply_overrides(&mut ini, config);
    }
    let (admin_user, admin_password) = admin_credentials(spec);
    ini.set("security", "admin_user", admin_user);
    ini.set("security", "admin_password", admin_password);
    ini
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_hash;
    use crate::grafana::grafana_resource::{IniLog, IniSecurity, IniServer};

    #[test]
    fn test_render_sorted_sections_and_keys() {
        let ini = IniDocument::from_sections(vec![
            ("server".to_owned(), vec![("protocol".to_owned(), "https".to_owned()), ("domain".to_owned(), "127.0.0.1".to_owned())]),
            ("auth".to_owned(), vec![("disable_login_form".to_owned(), "true".to_owned())]),
        ]);
        assert_eq!(ini.render(), "[auth]\ndisable_login_form = true\n\n[server]\ndomain = 127.0.0.1\nprotocol = https\n\n");
    }

    #[test]
    fn test_hash_independent_of_insertion_order() {
        let entries = vec![
            ("mode".to_owned(), "console".to_owned()),
            ("level".to_owned(), "debug".to_owned()),
            ("filters".to_owned(), "rendering:debug".to_owned()),
        ];
        let mut reversed = entries.clone();
        reversed.reverse();
        let first = IniDocument::from_sections(vec![("log".to_owned(), entries), ("paths".to_owned(), vec![("data".to_owned(), "/data".to_owned())])]);
        let second = IniDocument::from_sections(vec![("paths".to_owned(), vec![("data".to_owned(), "/data".to_owned())]), ("log".to_owned(), reversed)]);
        assert_eq!(config_hash::hash_content(&first.render()), config_hash::hash_content(&second.render()));
    }

    #[test]
    fn test_defaults_without_config() {
        let ini = build_grafana_ini(&GrafanaSpec::default());
        assert_eq!(ini.get("server", "http_port"), Some(&"3000".to_owned()));
        assert_eq!(ini.get("security", "admin_user"), Some(&"admin".to_owned()));
        assert_eq!(ini.get("security", "admin_password"), Some(&"admin".to_owned()));
        assert_eq!(ini.get("auth.proxy", "header_name"), Some(&"X-WEBAUTH-USER".to_owned()));
    }

    #[test]
    fn test_spec_overrides_defaults() {
        let spec = GrafanaSpec {
            grafana_config: Some(GrafanaIniConfig {
                server: Some(IniServer { http_port: Some("3001".to_owned()), root_url: None }),
                log: Some(IniLog { mode: None, level: Some("debug".to_owned()), filters: Some(String::new()) }),
                security: Some(IniSecurity { admin_user: Some("root".to_owned()), ..IniSecurity::default() }),
                extra: Some(BTreeMap::from([("analytics".to_owned(), BTreeMap::from([("reporting_enabled".to_owned(), "false".to_owned())]))])),
                ..GrafanaIniConfig::default()
            }),
            ..GrafanaSpec::default()
        };
        let ini = build_grafana_ini(&spec);
        assert_eq!(ini.get("server", "http_port"), Some(&"3001".to_owned()));
        assert_eq!(ini.get("log", "level"), Some(&"debug".to_owned()));
        assert_eq!(ini.get("log", "mode"), Some(&"console".to_owned()));
        assert_eq!(ini.get("log", "filters"), None);
        assert_eq!(ini.get("security", "admin_user"), Some(&"root".to_owned()));
        assert_eq!(ini.get("security", "admin_password"), Some(&"admin".to_owned()));
        assert_eq!(ini.get("analytics", "reporting_enabled"), Some(&"false".to_owned()));
    }

    #[test]
    fn test_build_is_deterministic() {
        let spec = GrafanaSpec::default();
        assert_eq!(build_grafana_ini(&spec).render(), build_grafana_ini(&spec).render());
    }
}
