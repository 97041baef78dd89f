use std::{path::Path, sync::Arc};

/// Static mutex holding the global configuration, initialized as `None`.
static TESSEL_GLOBAL_CONFIG: spin::Mutex<Option<Arc<LoweringConfig>>> = spin::Mutex::new(None);

/// Configuration of the structured-to-memref lowering.
#[derive(Default, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LoweringConfig {
    /// Configuration of the wraparound splitting.
    #[serde(default)]
    pub wraparound: WraparoundConfig,

    /// Configuration of the compilation logger.
    #[serde(default)]
    pub logger: LoggerConfig,
}

#[derive(Default, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WraparoundConfig {
    /// Emit run time assertions for the "offset hasn't wrapped yet" precondition of split
    /// pointers. Without them a violated precondition silently produces wrong addresses.
    #[serde(default)]
    pub check_offsets: bool,
}

#[derive(Default, Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LoggerConfig {
    /// How much of the lowering is reported through the `log` crate.
    #[serde(default)]
    pub level: CompilationLogLevel,
}

/// Verbosity of the compilation logger.
#[derive(
    Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize, Hash, PartialEq, Eq,
)]
pub enum CompilationLogLevel {
    /// Nothing is logged beyond per-rewrite `debug`/`trace` records.
    #[default]
    #[serde(rename = "disabled")]
    Disabled,
    /// A summary of every lowered scope.
    #[serde(rename = "basic")]
    Basic,
    /// The summary and the whole lowered scope.
    #[serde(rename = "full")]
    Full,
}

impl LoweringConfig {
    /// Retrieves the current global configuration, loading it if not set.
    ///
    /// If no configuration is set, it is read from `tessel.toml` in the current directory or its
    /// parents, then overridden from the environment. Without a file, the default configuration
    /// is used.
    pub fn get() -> Arc<Self> {
        let mut state = TESSEL_GLOBAL_CONFIG.lock();
        match state.as_ref() {
            Some(config) => config.clone(),
            None => {
                let config = Arc::new(Self::from_current_dir().override_from_env());
                *state = Some(config.clone());
                config
            }
        }
    }

    /// Sets the global configuration to the provided value.
    ///
    /// # Panics
    /// Panics if the configuration has already been set or read, as it cannot be overridden.
    pub fn set(config: Self) {
        let mut state = TESSEL_GLOBAL_CONFIG.lock();
        if state.is_some() {
            panic!("Cannot set the global configuration multiple times.");
        }
        *state = Some(Arc::new(config));
    }

    /// Parse a configuration from the content of a `tessel.toml` file.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Overrides configuration fields based on environment variables.
    pub fn override_from_env(self) -> Self {
        self.override_from(|key| std::env::var(key).ok())
    }

    fn override_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = var("TESSEL_DEBUG_LOG") {
            match val.as_str() {
                "0" | "false" => self.logger.level = CompilationLogLevel::Disabled,
                "1" | "true" | "basic" => self.logger.level = CompilationLogLevel::Basic,
                "full" => self.logger.level = CompilationLogLevel::Full,
                other => log::warn!("Ignoring unknown TESSEL_DEBUG_LOG value {other:?}"),
            }
        }

        if let Some(val) = var("TESSEL_CHECK_WRAPAROUND") {
            match val.as_str() {
                "0" | "false" => self.wraparound.check_offsets = false,
                "1" | "true" => self.wraparound.check_offsets = true,
                other => log::warn!("Ignoring unknown TESSEL_CHECK_WRAPAROUND value {other:?}"),
            }
        }

        self
    }

    // Traverses up the directory tree until a `tessel.toml` is found or the root is reached.
    fn from_current_dir() -> Self {
        let Ok(mut dir) = std::env::current_dir() else {
            return Self::default();
        };

        loop {
            let path = dir.join("tessel.toml");
            if path.is_file() {
                return Self::from_file_path(&path);
            }

            if !dir.pop() {
                break;
            }
        }

        Self::default()
    }

    fn from_file_path(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                log::warn!("Can't read {}, using the default config: {err}", path.display());
                return Self::default();
            }
        };

        match Self::from_toml(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!(
                    "{} doesn't have the right format, using the default config: {err}",
                    path.display()
                );
                Self::default()
            }
        }
    }
}
