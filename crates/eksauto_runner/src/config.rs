//! Container configuration types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Bind mount of a host directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountConfig {
    pub source: PathBuf,
    pub target: String,
    pub read_only: bool,
}

impl MountConfig {
    pub fn new(source: PathBuf, target: impl Into<String>) -> Self {
        Self {
            source,
            target: target.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Container configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub image: String,
    pub tag: String,
    pub command: Vec<String>,
    pub workdir: Option<String>,
    pub env: BTreeMap<String, String>,
    pub mounts: Vec<MountConfig>,
    pub name_prefix: Option<String>,
    pub network_mode: Option<String>,
}

impl ContainerConfig {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            tag: "latest".to_string(),
            command: Vec::new(),
            workdir: None,
            env: BTreeMap::new(),
            mounts: Vec::new(),
            name_prefix: None,
            network_mode: None,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn command(mut self, cmd: Vec<String>) -> Self {
        self.command = cmd;
        self
    }

    pub fn workdir(mut self, dir: impl Into<String>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Copy the named variables from the host environment when they are set.
    pub fn env_passthrough<'a>(mut self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        for key in keys {
            if let Ok(value) = std::env::var(key) {
                self.env.insert(key.to_string(), value);
            }
        }
        self
    }

    pub fn mount(mut self, mount: MountConfig) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network_mode = Some(network.into());
        self
    }

    pub fn full_image(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    /// Environment keys, for logging without values.
    pub fn env_keys(&self) -> Vec<&str> {
        self.env.keys().map(String::as_str).collect()
    }
}

/// Run limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Timeout in seconds (0 = no timeout)
    pub timeout_seconds: u64,
    pub pull_image: bool,
    pub memory_limit: Option<i64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            // cluster creation regularly takes 10+ minutes
            timeout_seconds: 45 * 60,
            pull_image: true,
            memory_limit: None,
        }
    }
}

impl RunConfig {
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn no_pull(mut self) -> Self {
        self.pull_image = false;
        self
    }

    pub fn memory(mut self, bytes: i64) -> Self {
        self.memory_limit = Some(bytes);
        self
    }
}

/// Engine CLI image.
pub struct EngineImage;

impl EngineImage {
    pub const PULUMI: &'static str = "pulumi/pulumi";
    pub const PULUMI_TAG: &'static str = "3.142.0";

    /// Variables the engine and the AWS provider read from the environment.
    pub const CREDENTIAL_ENV: &'static [&'static str] = &[
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "AWS_SESSION_TOKEN",
        "AWS_REGION",
        "AWS_DEFAULT_REGION",
        "AWS_PROFILE",
        "PULUMI_ACCESS_TOKEN",
        "PULUMI_BACKEND_URL",
        "PULUMI_CONFIG_PASSPHRASE",
    ];

    pub fn pulumi() -> ContainerConfig {
        ContainerConfig::new(Self::PULUMI).tag(Self::PULUMI_TAG)
    }
}
