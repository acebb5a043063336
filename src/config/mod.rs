//! Configuration management.
//!
//! Configuration is read from a TOML file and then overridden by
//! `TREEGUARD_*` environment variables. Every key is optional; missing keys
//! fall back to the defaults below.
//!
//! ```toml
//! database = "/var/lib/repository/repository.db"
//! root_ref_id = 1
//!
//! [recovery_folder]
//! title = "__Restored Objects"
//! parent_ref_id = 1
//!
//! [object_types]
//! excluded = ["adm", "root", "ldap", "mail", "usrf", "objf", "lngf"]
//! role_folder = "rolf"
//!
//! [modes]
//! analyze = true
//! clean = true
//!
//! [logging]
//! format = "json"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::{ModeController, RefId};
use crate::observability::LogFormat;
use crate::{Error, Result};

/// Environment variable overriding the database path.
pub const DATABASE_ENV: &str = "TREEGUARD_DATABASE";

/// Environment variable overriding the root reference id.
pub const ROOT_REF_ID_ENV: &str = "TREEGUARD_ROOT_REF_ID";

/// Environment variable holding comma separated `NAME=BOOL` mode assignments.
pub const MODES_ENV: &str = "TREEGUARD_MODES";

/// Default reference id of the repository root node.
pub const DEFAULT_ROOT_REF_ID: RefId = 1;

/// Default title identifying the recovery folder.
pub const DEFAULT_RECOVERY_FOLDER_TITLE: &str = "__Restored Objects";

/// Default description given to a newly created recovery folder.
pub const DEFAULT_RECOVERY_FOLDER_DESCRIPTION: &str = "Contains objects restored by recovery tool";

/// Object types that are never re-attached to the tree by a restore.
pub const DEFAULT_EXCLUDED_TYPES: &[&str] = &["adm", "root", "ldap", "mail", "usrf", "objf", "lngf"];

/// Object types that take part in the permission system.
pub const DEFAULT_RBAC_TYPES: &[&str] = &[
    "adm", "root", "cat", "crs", "grp", "fold", "file", "frm", "lm", "dbk", "glo", "exc", "tst",
    "qpl", "svy", "spl", "chat", "htlm", "sahs", "webr", "mep", "rolf", "mail", "usrf", "objf",
    "lngf", "ldap",
];

/// Main configuration for the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Path to the `SQLite` repository database.
    pub database: PathBuf,
    /// Reference id of the repository root; the compactor renumbers from here.
    pub root_ref_id: RefId,
    /// Recovery folder settings.
    pub recovery_folder: RecoveryFolderConfig,
    /// Object type sets.
    pub object_types: ObjectTypesConfig,
    /// Initial modes.
    pub modes: ModeController,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Recovery folder settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryFolderConfig {
    /// Title the folder is looked up by.
    pub title: String,
    /// Description set on creation.
    pub description: String,
    /// Parent the folder is created under; `None` means the root.
    pub parent_ref_id: Option<RefId>,
}

impl Default for RecoveryFolderConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_RECOVERY_FOLDER_TITLE.to_string(),
            description: DEFAULT_RECOVERY_FOLDER_DESCRIPTION.to_string(),
            parent_ref_id: None,
        }
    }
}

/// Object type sets used by the scans and the restorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTypesConfig {
    /// Types in scope for validation.
    pub rbac: Vec<String>,
    /// Types never re-attached by a restore.
    pub excluded: Vec<String>,
    /// Type of permission-system role folders, discarded on restore.
    pub role_folder: String,
    /// Type used to create the recovery folder.
    pub container: String,
}

impl Default for ObjectTypesConfig {
    fn default() -> Self {
        Self {
            rbac: DEFAULT_RBAC_TYPES.iter().map(ToString::to_string).collect(),
            excluded: DEFAULT_EXCLUDED_TYPES.iter().map(ToString::to_string).collect(),
            role_folder: "rolf".to_string(),
            container: "cat".to_string(),
        }
    }
}

impl ObjectTypesConfig {
    /// Returns `true` if `object_type` is excluded from restore.
    #[must_use]
    pub fn is_excluded(&self, object_type: &str) -> bool {
        self.excluded.iter().any(|t| t == object_type)
    }

    /// Returns `true` if `object_type` is the role folder type.
    #[must_use]
    pub fn is_role_folder(&self, object_type: &str) -> bool {
        self.role_folder == object_type
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Output format.
    pub format: LogFormat,
    /// Filter directive, e.g. `info` or `treeguard=debug`.
    pub level: Option<String>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Database path.
    pub database: Option<String>,
    /// Root reference id.
    pub root_ref_id: Option<RefId>,
    /// Recovery folder section.
    pub recovery_folder: Option<ConfigFileRecoveryFolder>,
    /// Object types section.
    pub object_types: Option<ConfigFileObjectTypes>,
    /// Modes section.
    pub modes: Option<ConfigFileModes>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Recovery folder section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRecoveryFolder {
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Parent reference id.
    pub parent_ref_id: Option<RefId>,
}

/// Object types section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileObjectTypes {
    /// Valid RBAC types.
    pub rbac: Option<Vec<String>>,
    /// Excluded types.
    pub excluded: Option<Vec<String>>,
    /// Role folder type.
    pub role_folder: Option<String>,
    /// Container type.
    pub container: Option<String>,
}

/// Modes section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileModes {
    /// Analyze mode.
    pub analyze: Option<bool>,
    /// Clean mode.
    pub clean: Option<bool>,
    /// Restore mode.
    pub restore: Option<bool>,
    /// Empty trash mode.
    pub empty_trash: Option<bool>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// `text` or `json`.
    pub format: Option<String>,
    /// Filter directive.
    pub level: Option<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("treeguard.db"),
            root_ref_id: DEFAULT_ROOT_REF_ID,
            recovery_folder: RecoveryFolderConfig::default(),
            object_types: ObjectTypesConfig::default(),
            modes: ModeController::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl ValidatorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidParameter(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::parse(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if the text is not valid TOML or
    /// does not match the expected structure.
    pub fn parse(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| Error::InvalidParameter(format!("invalid config: {e}")))?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir, then `~/.config/treeguard/`. Returns
    /// the default configuration if no readable file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("treeguard").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("treeguard")
                .join("config.toml"),
        ];

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
                },
            }
        }

        Self::default()
    }

    /// Applies `TREEGUARD_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if an override cannot be parsed.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(database) = std::env::var(DATABASE_ENV) {
            self.database = PathBuf::from(database);
        }
        if let Ok(root) = std::env::var(ROOT_REF_ID_ENV) {
            self.root_ref_id = root.trim().parse().map_err(|_| {
                Error::InvalidParameter(format!("{ROOT_REF_ID_ENV} must be an integer: '{root}'"))
            })?;
        }
        if let Ok(modes) = std::env::var(MODES_ENV) {
            self.apply_mode_assignments(modes.split(','))?;
        }
        Ok(self)
    }

    /// Applies `NAME=BOOL` assignments to the configured modes.
    ///
    /// Assignments are validated on a copy, so on error nothing is applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] on the first malformed assignment.
    pub fn apply_mode_assignments<'a>(
        &mut self,
        assignments: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        let mut modes = self.modes;
        for assignment in assignments.into_iter().map(str::trim).filter(|a| !a.is_empty()) {
            modes.apply_assignment(assignment)?;
        }
        self.modes = modes;
        Ok(())
    }

    /// Converts a `ConfigFile` to `ValidatorConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(database) = file.database {
            config.database = PathBuf::from(database);
        }
        if let Some(root) = file.root_ref_id {
            config.root_ref_id = root;
        }
        if let Some(folder) = file.recovery_folder {
            if let Some(title) = folder.title {
                config.recovery_folder.title = title;
            }
            if let Some(description) = folder.description {
                config.recovery_folder.description = description;
            }
            config.recovery_folder.parent_ref_id = folder.parent_ref_id;
        }
        if let Some(types) = file.object_types {
            if let Some(rbac) = types.rbac {
                config.object_types.rbac = rbac;
            }
            if let Some(excluded) = types.excluded {
                config.object_types.excluded = excluded;
            }
            if let Some(role_folder) = types.role_folder {
                config.object_types.role_folder = role_folder;
            }
            if let Some(container) = types.container {
                config.object_types.container = container;
            }
        }
        if let Some(modes) = file.modes {
            let pairs = [
                (crate::models::Mode::Analyze, modes.analyze),
                (crate::models::Mode::Clean, modes.clean),
                (crate::models::Mode::Restore, modes.restore),
                (crate::models::Mode::EmptyTrash, modes.empty_trash),
            ];
            for (mode, value) in pairs {
                if let Some(v) = value {
                    config.modes.set_mode(mode, v);
                }
            }
        }
        if let Some(logging) = file.logging {
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format);
            }
            config.logging.level = logging.level;
        }

        config
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = path.into();
        self
    }

    /// Sets the root reference id.
    #[must_use]
    pub const fn with_root_ref_id(mut self, root_ref_id: RefId) -> Self {
        self.root_ref_id = root_ref_id;
        self
    }

    /// Sets the initial modes.
    #[must_use]
    pub const fn with_modes(mut self, modes: ModeController) -> Self {
        self.modes = modes;
        self
    }

    /// Reference id the recovery folder is created under.
    #[must_use]
    pub fn recovery_parent_ref_id(&self) -> RefId {
        self.recovery_folder
            .parent_ref_id
            .unwrap_or(self.root_ref_id)
    }
}
