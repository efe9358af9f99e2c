use crate::wol;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_CONFIG_FILE: &str = "config.yml";

// Paths served by the web module itself; the alive route must not shadow them.
const RESERVED_ROUTES: [&str; 4] = ["/", "/index.html", "/api/wake", "/varz"];

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// YAML (or .json) config file, config.yml if present. Flags and
    /// environment variables override its values.
    #[arg(long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "LISTEN_ADDRESS")]
    pub listen_address: Option<String>,

    /// Broadcast address of the sleeping server's network, without a port.
    #[arg(long, env = "BCAST_ADDRESS")]
    pub broadcast_address: Option<String>,

    /// Server MAC address for WoL, in xx:xx:xx:xx:xx:xx form.
    #[arg(long, env = "MAC_ADDRESS")]
    pub mac_address: Option<String>,

    /// Name shown on the wake page.
    #[arg(long, env = "SERVICE_NAME")]
    pub service_name: Option<String>,

    /// Seconds the server usually needs to boot.
    #[arg(long, env = "SERVER_WAKEUP_TIME")]
    pub server_wakeup_time: Option<u32>,

    /// Route polled by the page until the woken service answers.
    #[arg(long, env = "SERVICE_ALIVE_ROUTE")]
    pub service_alive_route: Option<String>,
}

// Mirrors `Args`, but as read from the config file.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FileConfig {
    listen_address: Option<String>,
    broadcast_address: Option<String>,
    mac_address: Option<String>,
    service_name: Option<String>,
    server_wakeup_time: Option<u32>,
    service_alive_route: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not read config file")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file")]
    Json(#[from] serde_json::Error),
    #[error("could not parse config file")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid mac address setting")]
    Wol(#[from] wol::Error),
    #[error("invalid alive route {0:?}")]
    InvalidRoute(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub listen_address: String,
    pub broadcast_address: String,
    pub mac_address: String,
    pub service_name: String,
    pub server_wakeup_time: u32,
    pub service_alive_route: String,
}

fn required<T>(name: &'static str, arg: Option<T>, file: Option<T>) -> Result<T, Error> {
    arg.or(file).ok_or(Error::Missing(name))
}

// An explicit path must exist; the default one is optional.
fn config_path(explicit: Option<&Path>, default: &Path) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None if default.is_file() => Some(default.to_path_buf()),
        None => None,
    }
}

fn read_file(path: &Path) -> Result<FileConfig, Error> {
    let contents = fs::read_to_string(path)?;
    if path.extension().map_or(false, |ext| ext == "json") {
        Ok(serde_json::from_str(&contents)?)
    } else {
        Ok(serde_yaml::from_str(&contents)?)
    }
}

impl Config {
    pub fn load(args: Args) -> Result<Config, Error> {
        let file = match config_path(args.config.as_deref(), Path::new(DEFAULT_CONFIG_FILE)) {
            Some(path) => read_file(&path)?,
            None => FileConfig::default(),
        };
        let config = Config {
            listen_address: args
                .listen_address
                .or(file.listen_address)
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string()),
            broadcast_address: required(
                "broadcastAddress",
                args.broadcast_address,
                file.broadcast_address,
            )?,
            mac_address: required("macAddress", args.mac_address, file.mac_address)?,
            service_name: required("serviceName", args.service_name, file.service_name)?,
            server_wakeup_time: required(
                "serverWakeupTime",
                args.server_wakeup_time,
                file.server_wakeup_time,
            )?,
            service_alive_route: required(
                "serviceAliveRoute",
                args.service_alive_route,
                file.service_alive_route,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        wol::MacAddress::parse(&self.mac_address)?;
        let route = &self.service_alive_route;
        if !route.starts_with('/')
            || route.starts_with("/static/")
            || RESERVED_ROUTES.contains(&route.as_str())
        {
            return Err(Error::InvalidRoute(route.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::*;
    use std::io::Write;

    fn full_args() -> Args {
        Args {
            config: None,
            listen_address: None,
            broadcast_address: Some("192.168.1.255".to_string()),
            mac_address: Some("00:11:22:33:44:55".to_string()),
            service_name: Some("jellyfin".to_string()),
            server_wakeup_time: Some(60),
            service_alive_route: Some("/alive".to_string()),
        }
    }

    fn temp_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("wolbutton-{}-{}", std::process::id(), name));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_args_only() {
        let config = Config::load(full_args()).unwrap();
        assert_eq!(config.listen_address, "0.0.0.0:8080");
        assert_eq!(config.broadcast_address, "192.168.1.255");
        assert_eq!(config.server_wakeup_time, 60);
    }

    #[test]
    fn test_missing_setting() {
        let args = Args {
            mac_address: None,
            ..full_args()
        };
        assert!(matches!(
            Config::load(args),
            Err(Error::Missing("macAddress"))
        ));
    }

    #[test]
    fn test_invalid_mac() {
        let args = Args {
            mac_address: Some("00:11:22:33:44".to_string()),
            ..full_args()
        };
        assert!(matches!(Config::load(args), Err(Error::Wol(_))));
    }

    #[test]
    fn test_invalid_route() {
        for route in ["alive", "/", "/api/wake", "/static/index.js"] {
            let args = Args {
                service_alive_route: Some(route.to_string()),
                ..full_args()
            };
            assert!(
                matches!(Config::load(args), Err(Error::InvalidRoute(_))),
                "{route}"
            );
        }
    }

    #[test]
    fn test_file_with_overrides() {
        let path = temp_config(
            "overrides.json",
            r#"{
                "listenAddress": "127.0.0.1:9000",
                "broadcastAddress": "10.0.0.255",
                "macAddress": "aa-bb-cc-dd-ee-ff",
                "serviceName": "nas",
                "serverWakeupTime": 30,
                "serviceAliveRoute": "/health"
            }"#,
        );
        let args = Args {
            config: Some(path.clone()),
            service_name: Some("media".to_string()),
            ..Args::default()
        };
        let config = Config::load(args).unwrap();
        fs::remove_file(path).unwrap();
        assert_eq!(
            config,
            Config {
                listen_address: "127.0.0.1:9000".to_string(),
                broadcast_address: "10.0.0.255".to_string(),
                mac_address: "aa-bb-cc-dd-ee-ff".to_string(),
                service_name: "media".to_string(),
                server_wakeup_time: 30,
                service_alive_route: "/health".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_file() {
        let path = temp_config("malformed.json", r#"{"macAddress": 12"#);
        let args = Args {
            config: Some(path.clone()),
            ..full_args()
        };
        let result = Config::load(args);
        fs::remove_file(path).unwrap();
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_yaml_file() {
        let path = temp_config(
            "config.yml",
            "broadcastAddress: 192.168.1.255\n\
             macAddress: \"00:11:22:33:44:55\"\n\
             serviceName: Jellyfin\n\
             serverWakeupTime: 90\n\
             serviceAliveRoute: /web/alive\n",
        );
        let args = Args {
            config: Some(path.clone()),
            ..Args::default()
        };
        let config = Config::load(args).unwrap();
        fs::remove_file(path).unwrap();
        assert_eq!(
            config,
            Config {
                listen_address: "0.0.0.0:8080".to_string(),
                broadcast_address: "192.168.1.255".to_string(),
                mac_address: "00:11:22:33:44:55".to_string(),
                service_name: "Jellyfin".to_string(),
                server_wakeup_time: 90,
                service_alive_route: "/web/alive".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_yaml() {
        let path = temp_config("malformed.yml", "serverWakeupTime: [soon\n");
        let args = Args {
            config: Some(path.clone()),
            ..full_args()
        };
        let result = Config::load(args);
        fs::remove_file(path).unwrap();
        assert!(matches!(result, Err(Error::Yaml(_))));
    }

    #[test]
    fn test_default_config_path() {
        let present = temp_config("default.yml", "serviceName: nas\n");
        let absent = std::env::temp_dir().join("wolbutton-absent-config.yml");
        assert_eq!(config_path(None, &present), Some(present.clone()));
        assert_eq!(config_path(None, &absent), None);
        assert_eq!(config_path(Some(absent.as_path()), &present), Some(absent));
        fs::remove_file(present).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let args = Args {
            config: Some(PathBuf::from("/nonexistent/wolbutton.json")),
            ..full_args()
        };
        assert!(matches!(Config::load(args), Err(Error::Io(_))));
    }
}
