//! Interpreter configuration.

/// Environment variable overriding `InterpreterConfig::max_modules`.
pub const MAX_MODULES_ENV: &str = "RTBRIDGE_MAX_MODULES";
/// Default capacity of one interpreter's module table.
pub const DEFAULT_MAX_MODULES: usize = 64;

/// Tunables for one interpreter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Module table capacity; creating a module past it is a
    /// `ModuleInitFailure`.
    pub max_modules: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_modules: DEFAULT_MAX_MODULES,
        }
    }
}

impl InterpreterConfig {
    /// Reads overrides from the process environment.
    ///
    /// # Errors
    /// - Returns an error when `RTBRIDGE_MAX_MODULES` is not a positive integer.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, which maps variable names to values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(MAX_MODULES_ENV) {
            let trimmed = raw.trim();
            config.max_modules = match trimmed.parse::<usize>() {
                Ok(value) if value > 0 => value,
                _ => {
                    return Err(format!(
                        "{MAX_MODULES_ENV} must be a positive integer, got `{trimmed}`"
                    ))
                }
            };
        }
        Ok(config)
    }
}
