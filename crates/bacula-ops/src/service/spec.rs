use std::path::{Path, PathBuf};

use super::reload::ReloadStrategy;
use super::validator::Validator;
use crate::template::{
    BACULA_DIR_TEMPLATE, BACULA_FD_TEMPLATE, BACULA_SD_TEMPLATE, BACULUM_API_TEMPLATE,
    BACULUM_WEB_HOSTS_TEMPLATE, BACULUM_WEB_SETTINGS_TEMPLATE, BCONSOLE_TEMPLATE,
    FD_CLIENT_TEMPLATE,
};

pub const SERVER_SNAP: &str = "charmed-bacula-server";

/// The services running on the backup server host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    File,
    Storage,
    Director,
    Web,
}

impl ServiceKind {
    /// File and storage daemons come before the director, the director
    /// before the web front end.
    pub const APPLY_ORDER: [ServiceKind; 4] = [
        ServiceKind::File,
        ServiceKind::Storage,
        ServiceKind::Director,
        ServiceKind::Web,
    ];

    pub fn service_name(self) -> &'static str {
        match self {
            ServiceKind::File => "bacula-fd",
            ServiceKind::Storage => "bacula-sd",
            ServiceKind::Director => "bacula-dir",
            ServiceKind::Web => "baculum",
        }
    }

    pub fn reload_strategy(self) -> ReloadStrategy {
        match self {
            ServiceKind::File | ServiceKind::Storage => ReloadStrategy::RestartOrStart,
            ServiceKind::Director => ReloadStrategy::signal("bacula-dir"),
            ServiceKind::Web => ReloadStrategy::StartIfAbsent,
        }
    }

    fn files(self) -> &'static [(&'static str, &'static str)] {
        match self {
            ServiceKind::File => &[("/opt/bacula/etc/bacula-fd.conf", BACULA_FD_TEMPLATE)],
            ServiceKind::Storage => &[("/opt/bacula/etc/bacula-sd.conf", BACULA_SD_TEMPLATE)],
            ServiceKind::Director => &[
                ("/opt/bacula/etc/bacula-dir.conf", BACULA_DIR_TEMPLATE),
                ("/opt/bacula/etc/bconsole.conf", BCONSOLE_TEMPLATE),
            ],
            ServiceKind::Web => &[
                (
                    "/usr/share/baculum/htdocs/protected/API/Config/api.conf",
                    BACULUM_API_TEMPLATE,
                ),
                (
                    "/usr/share/baculum/htdocs/protected/Web/Config/hosts.conf",
                    BACULUM_WEB_HOSTS_TEMPLATE,
                ),
                (
                    "/usr/share/baculum/htdocs/protected/Web/Config/settings.conf",
                    BACULUM_WEB_SETTINGS_TEMPLATE,
                ),
            ],
        }
    }
}

/// One configuration file and the template it is rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedFile {
    pub path: PathBuf,
    pub template: String,
}

/// Everything needed to manage one service's configuration.
///
/// The first file is the primary one and is the only one validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub files: Vec<ManagedFile>,
    pub validator: Validator,
    pub reload: ReloadStrategy,
}

/// Places an absolute service path under `root`.
fn rooted(root: &Path, path: &str) -> PathBuf {
    root.join(path.trim_start_matches('/'))
}

impl ServiceSpec {
    /// A server service with its files placed under `root` (the snap's
    /// common directory).
    pub fn server(kind: ServiceKind, root: &Path) -> Self {
        let name = kind.service_name();
        let validator = match kind {
            ServiceKind::Web => Validator::Skip,
            _ => Validator::command(format!("{}.{}-test", SERVER_SNAP, name)),
        };

        Self {
            name: name.to_string(),
            files: kind
                .files()
                .iter()
                .map(|(path, template)| ManagedFile {
                    path: rooted(root, path),
                    template: template.to_string(),
                })
                .collect(),
            validator,
            reload: kind.reload_strategy(),
        }
    }

    /// All server services in apply order.
    pub fn server_set(root: &Path) -> Vec<Self> {
        ServiceKind::APPLY_ORDER
            .iter()
            .map(|kind| Self::server(*kind, root))
            .collect()
    }

    /// The standalone file daemon on a backup source host.
    pub fn fd_client(root: &Path) -> Self {
        Self {
            name: "bacula-fd".to_string(),
            files: vec![ManagedFile {
                path: rooted(root, "/etc/bacula/bacula-fd.conf"),
                template: FD_CLIENT_TEMPLATE.to_string(),
            }],
            validator: Validator::command_with_args("bacula-fd", &["-t", "-c"]),
            reload: ReloadStrategy::RestartOrStart,
        }
    }

    pub fn primary(&self) -> Option<&ManagedFile> {
        self.files.first()
    }
}
