//! Runtime course descriptor.

use serde::{Deserialize, Serialize};

use crate::domain::build_config::build_name_for;
use crate::error::ConfigError;

/// Placeholder left in `expected_runtimes` until a build fills it in.
pub const SUPPORTED_RUNTIMES_TOKEN: &str = "{{supported_dbrs}}";

/// Course metadata as seen by a running notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseConfig {
    pub course_code: String,
    pub course_name: String,
    pub build_name: String,
    pub data_source_name: String,
    pub data_source_version: String,
    pub install_min_time: String,
    pub install_max_time: String,
    pub remote_files: Vec<String>,
    pub supported_runtimes: Vec<String>,
}

/// Constructor arguments of [`CourseConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSpec {
    pub course_code: String,
    pub course_name: String,
    pub data_source_name: String,
    pub data_source_version: String,
    pub install_min_time: String,
    pub install_max_time: String,
    #[serde(default)]
    pub remote_files: Vec<String>,
    pub supported_runtimes: Vec<String>,
    /// Comma separated runtime list injected at build time, or the
    /// placeholder token when not built.
    pub expected_runtimes: String,
}

impl CourseConfig {
    /// Validate `spec` and derive the build name.
    ///
    /// Unless the expected list is still the placeholder, it must name exactly
    /// the supported runtimes (order does not matter).
    pub fn new(spec: CourseSpec) -> Result<Self, ConfigError> {
        if spec.course_name.trim().is_empty() {
            return Err(ConfigError::EmptyField {
                field: "course_name",
            });
        }

        if spec.expected_runtimes != SUPPORTED_RUNTIMES_TOKEN {
            let expected: Vec<String> = spec
                .expected_runtimes
                .split(',')
                .map(|e| e.trim().to_string())
                .collect();
            let matches = expected.len() == spec.supported_runtimes.len()
                && spec.supported_runtimes.iter().all(|r| expected.contains(r))
                && expected.iter().all(|e| spec.supported_runtimes.contains(e));
            if !matches {
                return Err(ConfigError::VersionListMismatch {
                    supported: spec.supported_runtimes,
                    expected,
                });
            }
        }

        Ok(Self {
            build_name: build_name_for(&spec.course_name),
            course_code: spec.course_code,
            course_name: spec.course_name,
            data_source_name: spec.data_source_name,
            data_source_version: spec.data_source_version,
            install_min_time: spec.install_min_time,
            install_max_time: spec.install_max_time,
            remote_files: spec.remote_files,
            supported_runtimes: spec.supported_runtimes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(expected: &str) -> CourseSpec {
        CourseSpec {
            course_code: "ec".to_string(),
            course_name: "example-course".to_string(),
            data_source_name: "example-course".to_string(),
            data_source_version: "v01".to_string(),
            install_min_time: "1 min".to_string(),
            install_max_time: "5 min".to_string(),
            remote_files: vec!["/README.md".to_string()],
            supported_runtimes: vec!["11.3.x-scala2.12".to_string(), "11.3.x-photon-scala2.12".to_string()],
            expected_runtimes: expected.to_string(),
        }
    }

    #[test]
    fn test_placeholder_skips_check() {
        let config = CourseConfig::new(spec(SUPPORTED_RUNTIMES_TOKEN)).unwrap();
        assert_eq!(config.build_name, "example-course");
        assert_eq!(config.supported_runtimes.len(), 2);
    }

    #[test]
    fn test_expected_list_in_any_order() {
        assert!(CourseConfig::new(spec("11.3.x-photon-scala2.12, 11.3.x-scala2.12")).is_ok());
    }

    #[test]
    fn test_mismatched_lists_rejected() {
        let err = CourseConfig::new(spec("11.3.x-scala2.12")).unwrap_err();
        assert!(matches!(err, ConfigError::VersionListMismatch { .. }));

        let err = CourseConfig::new(spec("11.3.x-scala2.12, 12.2.x-scala2.12")).unwrap_err();
        match err {
            ConfigError::VersionListMismatch { expected, .. } => {
                assert_eq!(expected, vec!["11.3.x-scala2.12", "12.2.x-scala2.12"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
