//! Internationalization: directive parsing and resource bundles.

pub mod bundle;
pub mod directive;

pub use bundle::ResourceBundle;
pub use directive::{GuidDirectiveParser, GuidRegistry, I18nDirective, DIRECTIVE_PREFIX};
