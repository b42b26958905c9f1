//! Operator configuration – reads/writes `~/.ironclad/config.toml`.
//!
//! A missing file is not an error: the caller writes [`Config::demo`] in its
//! place.  Inside a file every table is optional and an absent one is empty.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ironclad_hal::sim::SimDriverConfig;
use ironclad_kernel::SafetyConfig;
use ironclad_kernel::collision_monitor::SceneConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scene::Motion;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No config file at {path}")]
    Missing { path: PathBuf },

    #[error("Failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn default_cycle_ms() -> u64 {
    50
}

fn default_bus_capacity() -> usize {
    ironclad_middleware::DEFAULT_CAPACITY
}

fn default_robot() -> String {
    "robot".to_string()
}

/// The robot written on first run: four nominal drivers and a tool that
/// drifts into a fixture at 0.1 m/s, coming within the pair margin after
/// about three seconds.
const DEMO_CONFIG: &str = r#"
robot = "robot"

[[hardware]]
id = "left_wheel"
kind = "actuator"

[[hardware]]
id = "right_wheel"
kind = "actuator"

[[hardware]]
id = "arm_joint_1"
kind = "actuator"

[[hardware]]
id = "gripper"
kind = "relay"

[[scene.bodies]]
path = "robot/tool"
shape = { kind = "sphere", radius = 0.05 }
pose = { translation = [-0.6, 0.0, 0.3] }

[[scene.bodies]]
path = "world/fixture"
shape = { kind = "box", half_extents = [0.2, 0.2, 0.3] }
pose = { translation = [0.0, 0.0, 0.3] }

[[scene.pairs]]
first = "robot/tool"
second = "world/fixture"
margin = 0.02

[[motions]]
path = "robot/tool"
velocity = [0.1, 0.0, 0.0]
"#;

/// Persisted operator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Collision scan period.
    #[serde(default = "default_cycle_ms")]
    pub cycle_ms: u64,

    /// Records buffered per error bus subscriber.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,

    /// Path prefix under which every simulated driver is registered.
    #[serde(default = "default_robot")]
    pub robot: String,

    #[serde(default)]
    pub safety: SafetyConfig,

    #[serde(default)]
    pub hardware: Vec<SimDriverConfig>,

    #[serde(default)]
    pub scene: SceneConfig,

    #[serde(default)]
    pub motions: Vec<Motion>,
}

impl Config {
    /// The built-in demo robot.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] only if the embedded document is broken.
    pub fn demo() -> Result<Self, ConfigError> {
        toml::from_str(DEMO_CONFIG).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<built-in demo>"),
            source,
        })
    }

    pub fn cycle(&self) -> Duration {
        Duration::from_millis(self.cycle_ms.max(1))
    }

    /// `bus_capacity`, never below one slot.
    pub fn intake_capacity(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

/// Return the path to `~/.ironclad/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".ironclad").join("config.toml")
}

/// Load the config from `path`, applying environment overrides.  Returns
/// `None` if the file does not exist.
///
/// # Errors
///
/// [`ConfigError::Read`] or [`ConfigError::Parse`] for an unreadable file.
pub fn load_from(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `IRONCLAD_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `IRONCLAD_DISARM_TIMEOUT_MS` | `safety.disarm_timeout_ms` |
/// | `IRONCLAD_BUS_CAPACITY` | `bus_capacity` |
/// | `IRONCLAD_CYCLE_MS` | `cycle_ms` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("IRONCLAD_DISARM_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.safety.disarm_timeout_ms = ms;
    }
    if let Ok(v) = std::env::var("IRONCLAD_BUS_CAPACITY")
        && let Ok(capacity) = v.parse::<usize>()
    {
        cfg.bus_capacity = capacity;
    }
    if let Ok(v) = std::env::var("IRONCLAD_CYCLE_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.cycle_ms = ms;
    }
}

/// Save the config to `path`, creating its directory if necessary.  On Unix
/// the directory is made `0o700` and the file `0o600`.
///
/// # Errors
///
/// [`ConfigError::Serialize`] or [`ConfigError::Write`].
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(write_err)?;
        }
    }
    let raw = toml::to_string_pretty(cfg)?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use ironclad_collision::Vec3;
    use ironclad_hal::sim::{SimBehaviour, SimDriverKind};
    use ironclad_kernel::collision_monitor::PairKind;
    use ironclad_types::ComponentPath;

    use super::*;

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::demo().unwrap(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn demo_config_survives_save_and_load() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::demo().unwrap(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");

        assert_eq!(loaded.scene, Config::demo().unwrap().scene);
        assert_eq!(loaded.robot, "robot");
        assert_eq!(loaded.hardware.len(), 4);
        assert_eq!(loaded.hardware[3].kind, SimDriverKind::Relay);
        assert_eq!(loaded.scene.bodies.len(), 2);
        assert_eq!(loaded.scene.pairs[0].kind, PairKind::Environment);
        assert_eq!(loaded.motions.len(), 1);
    }

    #[test]
    fn config_path_points_to_ironclad_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".ironclad"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn absent_tables_are_empty() {
        let cfg: Config = toml::from_str("cycle_ms = 20").unwrap();
        assert_eq!(cfg.cycle_ms, 20);
        assert_eq!(cfg.bus_capacity, ironclad_middleware::DEFAULT_CAPACITY);
        assert_eq!(cfg.safety, SafetyConfig::default());
        assert!(cfg.hardware.is_empty());
        assert!(cfg.scene.bodies.is_empty());
        assert!(cfg.motions.is_empty());
    }

    #[test]
    fn hand_written_file_parses() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("robot.toml");
        std::fs::write(
            &path,
            r#"
            robot = "cell_3/arm"

            [safety]
            command_capacity = 8

            [[hardware]]
            id = "shoulder"
            kind = "actuator"
            behaviour = { fail_disarm = "brake stuck" }

            [[scene.bodies]]
            path = "cell_3/arm/wrist"
            shape = { kind = "sphere", radius = 0.05 }

            [[scene.bodies]]
            path = "cell_3/fence"
            shape = { kind = "box", half_extents = [2.0, 0.05, 1.0] }
            pose = { translation = [0.0, 1.0, 1.0] }

            [[scene.pairs]]
            first = "cell_3/arm/wrist"
            second = "cell_3/fence"
            margin = 0.1

            [[motions]]
            path = "cell_3/arm/wrist"
            velocity = [0.0, 0.2, 0.0]
            "#,
        )
        .unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.robot, "cell_3/arm");
        assert_eq!(
            cfg.scene.bodies[1].path,
            ComponentPath::parse("cell_3/fence").unwrap()
        );
        assert_eq!(cfg.safety.command_capacity, 8);
        assert_eq!(
            cfg.hardware[0].behaviour,
            SimBehaviour::FailDisarm("brake stuck".into())
        );
        assert_eq!(cfg.scene.pairs[0].margin, 0.1);
        assert_eq!(cfg.motions[0].velocity, Vec3::new(0.0, 0.2, 0.0));
    }

    #[test]
    fn zero_capacity_and_cycle_are_clamped() {
        let cfg: Config = toml::from_str("bus_capacity = 0\ncycle_ms = 0\n").unwrap();

        assert_eq!(cfg.intake_capacity(), 1);
        assert_eq!(cfg.cycle(), Duration::from_millis(1));
        let bus = ironclad_middleware::ErrorBus::new(cfg.intake_capacity());
        let _rx = bus.subscribe();
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "cycle_ms = \"fast\"").unwrap();
        assert!(matches!(load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn apply_env_overrides_changes_fields_and_ignores_garbage() {
        // SAFETY: these variables are only touched by this test.
        unsafe {
            std::env::set_var("IRONCLAD_DISARM_TIMEOUT_MS", "750");
            std::env::set_var("IRONCLAD_BUS_CAPACITY", "1024");
            std::env::set_var("IRONCLAD_CYCLE_MS", "not-a-number");
        }
        let mut cfg = Config::demo().unwrap();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.safety.disarm_timeout_ms, 750);
        assert_eq!(cfg.bus_capacity, 1024);
        assert_eq!(cfg.cycle_ms, default_cycle_ms());
        unsafe {
            std::env::remove_var("IRONCLAD_DISARM_TIMEOUT_MS");
            std::env::remove_var("IRONCLAD_BUS_CAPACITY");
            std::env::remove_var("IRONCLAD_CYCLE_MS");
        }
    }
}
