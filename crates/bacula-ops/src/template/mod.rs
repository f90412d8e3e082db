//! Strict template rendering for managed configuration files.
//!
//! Templates use a small, deterministic syntax:
//! - `{{ dotted.path }}` substitutes a scalar variable
//! - `{% for item in list %}` ... `{% endfor %}` repeats a block
//! - `{% if path %}` / `{% if not path %}` ... `{% else %}` ... `{% endif %}`
//!
//! Referencing a variable that is not defined is always an error.

mod renderer;

use std::path::PathBuf;
use thiserror::Error;

pub use renderer::TemplateRenderer;

pub const BACULA_FD_TEMPLATE: &str = "bacula-fd.conf.tmpl";
pub const BACULA_SD_TEMPLATE: &str = "bacula-sd.conf.tmpl";
pub const BACULA_DIR_TEMPLATE: &str = "bacula-dir.conf.tmpl";
pub const BCONSOLE_TEMPLATE: &str = "bconsole.conf.tmpl";
pub const BACULUM_API_TEMPLATE: &str = "baculum-api.conf.tmpl";
pub const BACULUM_WEB_HOSTS_TEMPLATE: &str = "baculum-web-hosts.conf.tmpl";
pub const BACULUM_WEB_SETTINGS_TEMPLATE: &str = "baculum-web-settings.conf.tmpl";
pub const FD_CLIENT_TEMPLATE: &str = "bacula-fd-client.conf.tmpl";

/// Templates compiled into the binary, by name.
pub(crate) const EMBEDDED_TEMPLATES: &[(&str, &str)] = &[
    (
        BACULA_FD_TEMPLATE,
        include_str!("../../templates/bacula-fd.conf.tmpl"),
    ),
    (
        BACULA_SD_TEMPLATE,
        include_str!("../../templates/bacula-sd.conf.tmpl"),
    ),
    (
        BACULA_DIR_TEMPLATE,
        include_str!("../../templates/bacula-dir.conf.tmpl"),
    ),
    (
        BCONSOLE_TEMPLATE,
        include_str!("../../templates/bconsole.conf.tmpl"),
    ),
    (
        BACULUM_API_TEMPLATE,
        include_str!("../../templates/baculum-api.conf.tmpl"),
    ),
    (
        BACULUM_WEB_HOSTS_TEMPLATE,
        include_str!("../../templates/baculum-web-hosts.conf.tmpl"),
    ),
    (
        BACULUM_WEB_SETTINGS_TEMPLATE,
        include_str!("../../templates/baculum-web-settings.conf.tmpl"),
    ),
    (
        FD_CLIENT_TEMPLATE,
        include_str!("../../templates/bacula-fd-client.conf.tmpl"),
    ),
];

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template '{0}' not found")]
    UnknownTemplate(String),

    #[error("Undefined variable '{name}' in template '{template}'")]
    UndefinedVariable { template: String, name: String },

    #[error("Syntax error in template '{template}': {message}")]
    Syntax { template: String, message: String },

    #[error("Variable '{name}' in template '{template}' is not a list")]
    NotIterable { template: String, name: String },

    #[error("Variable '{name}' in template '{template}' cannot be rendered as text")]
    NotScalar { template: String, name: String },

    #[error("Failed to read template '{path}': {source}")]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
