//! The fixed two-service topology and its compose rendering.

use crate::config::{MoodleConfig, Settings, APP_VOLUME};
use serde::Serialize;
use std::collections::BTreeMap;

pub const DB_SERVICE: &str = "db";
pub const APP_SERVICE: &str = "app";

const HEADER: &str = "# Generated by moodle-stack; changes are overwritten on install.\n";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComposeFile {
    pub services: BTreeMap<String, Service>,
    pub volumes: BTreeMap<String, Volume>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Service {
    pub image: String,
    pub restart: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub volumes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Volume {}

impl ComposeFile {
    pub fn build(cfg: &MoodleConfig, settings: &Settings) -> Self {
        let mut services = BTreeMap::new();

        let db_env: BTreeMap<String, String> = [
            ("MYSQL_ROOT_PASSWORD", &cfg.mysql_root_password),
            ("MYSQL_DATABASE", &cfg.mysql_database),
            ("MYSQL_USER", &cfg.mysql_user),
            ("MYSQL_PASSWORD", &cfg.mysql_password),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();

        // Database port stays internal to the compose network.
        services.insert(
            DB_SERVICE.to_string(),
            Service {
                image: settings.mysql_image.clone(),
                restart: "unless-stopped".to_string(),
                depends_on: vec![],
                ports: vec![],
                environment: db_env,
                volumes: vec![format!("{}:/var/lib/mysql", settings.db_data_dir.display())],
            },
        );

        let app_env: BTreeMap<String, String> = [
            ("MOODLE_DATABASE_TYPE", "mysqli"),
            ("MOODLE_DATABASE_HOST", DB_SERVICE),
            ("MOODLE_DATABASE_NAME", cfg.mysql_database.as_str()),
            ("MOODLE_DATABASE_USER", cfg.mysql_user.as_str()),
            ("MOODLE_DATABASE_PASSWORD", cfg.mysql_password.as_str()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        services.insert(
            APP_SERVICE.to_string(),
            Service {
                image: cfg.moodle_image.clone(),
                restart: "unless-stopped".to_string(),
                depends_on: vec![DB_SERVICE.to_string()],
                ports: vec![format!("{}:80", cfg.moodle_port)],
                environment: app_env,
                volumes: vec![format!("{APP_VOLUME}:/var/www/moodledata")],
            },
        );

        let mut volumes = BTreeMap::new();
        volumes.insert(APP_VOLUME.to_string(), Volume::default());

        ComposeFile { services, volumes }
    }

    /// Service names ordered so each comes after the ones it depends on.
    pub fn start_order(&self) -> Vec<&str> {
        let mut order: Vec<&str> = Vec::new();
        while order.len() < self.services.len() {
            let before = order.len();
            for (name, svc) in &self.services {
                if order.contains(&name.as_str()) {
                    continue;
                }
                if svc.depends_on.iter().all(|d| order.contains(&d.as_str())) {
                    order.push(name);
                }
            }
            if order.len() == before {
                break;
            }
        }
        order
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        Ok(format!("{HEADER}{}", serde_yaml::to_string(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sample_lookup;
    use std::path::Path;

    fn sample() -> ComposeFile {
        let cfg = MoodleConfig::from_lookup(sample_lookup).unwrap();
        let settings = Settings::from_lookup(Path::new("/srv/moodle"), |_| None);
        ComposeFile::build(&cfg, &settings)
    }

    #[test]
    fn test_app_maps_configured_port_to_80() {
        let c = sample();
        assert_eq!(c.services[APP_SERVICE].ports, vec!["8080:80".to_string()]);
        assert_eq!(c.services[APP_SERVICE].image, "example/moodle:latest");
    }

    #[test]
    fn test_db_is_internal_only() {
        let c = sample();
        let db = &c.services[DB_SERVICE];
        assert!(db.ports.is_empty());
        assert_eq!(db.volumes, vec!["/srv/moodle/mysql_data:/var/lib/mysql".to_string()]);
        assert_eq!(db.environment["MYSQL_DATABASE"], "moodle");
    }

    #[test]
    fn test_relative_root_bind_mount_is_absolute() {
        let cfg = MoodleConfig::from_lookup(sample_lookup).unwrap();
        let settings = Settings::from_lookup(Path::new("site"), |_| None);
        let c = ComposeFile::build(&cfg, &settings);

        let mount = &c.services[DB_SERVICE].volumes[0];
        assert!(mount.starts_with('/'), "bind source must be absolute: {mount}");
        assert!(mount.ends_with("site/mysql_data:/var/lib/mysql"));
    }

    #[test]
    fn test_db_starts_before_app() {
        assert_eq!(sample().start_order(), vec![DB_SERVICE, APP_SERVICE]);
    }

    #[test]
    fn test_app_uses_named_volume() {
        let c = sample();
        assert!(c.volumes.contains_key(APP_VOLUME));
        assert_eq!(
            c.services[APP_SERVICE].volumes,
            vec!["moodledata:/var/www/moodledata".to_string()]
        );
    }

    #[test]
    fn test_yaml_rendering() {
        let yaml = sample().to_yaml().unwrap();
        assert!(yaml.starts_with("# Generated by moodle-stack"));

        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
        let app = &parsed["services"]["app"];
        assert_eq!(app["ports"][0].as_str(), Some("8080:80"));
        assert_eq!(app["depends_on"][0].as_str(), Some("db"));
        assert!(parsed["services"]["db"].get("ports").is_none());
        assert!(parsed["volumes"].get("moodledata").is_some());
    }
}
