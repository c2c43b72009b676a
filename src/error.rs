use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced at the edges of the crate (configuration, parsing).
///
/// The simulation engine itself never returns these: invalid physical
/// inputs are replaced by defaults and logged instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration file parsed but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A distribution mode name that is not one of the known modes.
    #[error("unknown distribution mode `{0}` (expected equilibrium, single_speed or dual_speed)")]
    UnknownDistributionMode(String),

    /// A gas name that is not in the preset table.
    #[error("unknown gas `{0}`")]
    UnknownGas(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_informative() {
        let e = Error::InvalidConfig("bin_count must be > 0".to_string());
        let msg = format!("{e}");
        assert!(msg.contains("invalid configuration"));
        assert!(msg.contains("bin_count"));
    }

    #[test]
    fn unknown_mode_lists_alternatives() {
        let msg = Error::UnknownDistributionMode("maxwell3d".into()).to_string();
        assert!(msg.contains("maxwell3d"));
        assert!(msg.contains("single_speed"));
    }
}
