// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the installer configuration file. The configuration
//! is parsed once, and handed to the installer workflow as an immutable value.
//! File I/O is left to the caller to figure out.
//!
//! # General Layout
//!
//! The configuration file is TOML. Only `repository.url` is required, every
//! other setting falls back to a default. All path settings go through shell
//! expansion, so `~` and `$VAR` are allowed anywhere a path is expected.
//!
//! Relative bundle and size report paths are resolved against the transfer
//! destination, because that is where the bundled archives land after the
//! file transfer. Relative integration assets are resolved against the
//! repository checkout.

use crate::{
    integration::Integration,
    tool::{ArchiveBundle, FileTransferSpec, RepositorySource},
};

use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

/// Installer configuration layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct InstallerConfig {
    /// Where the dotfiles come from, and where they are checked out.
    pub repository: RepositorySettings,

    /// How the checkout is copied into the destination.
    #[serde(default)]
    pub transfer: TransferSettings,

    /// Paths whose disk usage is reported before the transfer.
    #[serde(default)]
    pub report: ReportSettings,

    /// Ordered listing of bundled archives to extract after the transfer.
    #[serde(rename = "bundle", default = "default_bundles")]
    pub bundles: Vec<BundleSettings>,

    /// Optional system integrations.
    #[serde(default)]
    pub integrations: IntegrationSettings,
}

impl InstallerConfig {
    /// Repository to clone or update.
    pub fn repository_source(&self) -> RepositorySource {
        RepositorySource {
            url: self.repository.url.clone(),
            local_path: self.repository.path.clone(),
            branch: self.repository.branch.clone(),
        }
    }

    /// File transfer from checkout to destination.
    ///
    /// The version control metadata directory is always excluded, whether
    /// the configuration lists it or not.
    pub fn transfer_spec(&self) -> FileTransferSpec {
        let mut exclusions = vec![".git/".to_string()];
        for pattern in &self.transfer.exclude {
            if !exclusions.contains(pattern) {
                exclusions.push(pattern.clone());
            }
        }

        FileTransferSpec {
            source: self.repository.path.clone(),
            destination: self.transfer.destination.clone(),
            exclusions,
        }
    }

    /// Size report targets resolved against the destination.
    pub fn report_paths(&self) -> Vec<PathBuf> {
        self.report
            .paths
            .iter()
            .map(|path| self.transfer.destination.join(path))
            .collect()
    }

    /// Bundles resolved against the destination, in extraction order.
    pub fn archive_bundles(&self) -> Vec<ArchiveBundle> {
        self.bundles
            .iter()
            .map(|bundle| ArchiveBundle {
                name: bundle.name.clone(),
                archive_path: self.transfer.destination.join(&bundle.archive),
                extract_to: self.transfer.destination.join(&bundle.extract_to),
            })
            .collect()
    }

    /// Integrations to offer, in the order they are offered.
    pub fn integrations(&self) -> Vec<Integration> {
        Integration::plan_all(&self.integrations, &self.repository.path)
    }

    fn expand_paths(&mut self) -> Result<()> {
        self.repository.path = expand(&self.repository.path)?;
        self.transfer.destination = expand(&self.transfer.destination)?;
        for path in &mut self.report.paths {
            *path = expand(path)?;
        }
        for bundle in &mut self.bundles {
            bundle.archive = expand(&bundle.archive)?;
            bundle.extract_to = expand(&bundle.extract_to)?;
        }
        if let Some(grub) = &mut self.integrations.grub_theme {
            grub.source = expand(&grub.source)?;
            grub.boot_dir = expand(&grub.boot_dir)?;
        }
        if let Some(sddm) = &mut self.integrations.sddm_theme {
            *sddm = expand(sddm)?;
        }

        Ok(())
    }
}

impl FromStr for InstallerConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: InstallerConfig =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        if config.repository.url.trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }

        // INVARIANT: Perform shell expansion on every path field.
        config.expand_paths()?;

        Ok(config)
    }
}

/// Repository settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct RepositorySettings {
    /// Remote URL to clone dotfiles from.
    pub url: String,

    /// Local checkout path.
    #[serde(default = "default_repository_path")]
    pub path: PathBuf,

    /// Branch to check out instead of the remote's default branch.
    pub branch: Option<String>,
}

/// File transfer settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    /// Directory that receives the dotfiles.
    pub destination: PathBuf,

    /// Tool used to copy files over.
    pub method: SyncMethod,

    /// Gitignore-style patterns that are never copied.
    pub exclude: Vec<String>,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("~"),
            method: SyncMethod::default(),
            exclude: ["README.md", "LICENSE", "install.sh", "docs/"]
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

/// File synchronization method.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMethod {
    /// Shell out to rsync.
    #[default]
    Rsync,

    /// Copy tracked files straight from the git index.
    Native,
}

/// Size report settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub paths: Vec<PathBuf>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            paths: [".config", ".local/share/fonts", ".themes", ".icons"]
                .into_iter()
                .map(PathBuf::from)
                .collect(),
        }
    }
}

/// Bundled archive entry.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct BundleSettings {
    /// Short name shown in logs.
    pub name: String,

    /// Path to compressed tarball.
    pub archive: PathBuf,

    /// Directory to extract into.
    pub extract_to: PathBuf,
}

impl BundleSettings {
    fn new(name: &str, archive: &str, extract_to: &str) -> Self {
        Self {
            name: name.into(),
            archive: archive.into(),
            extract_to: extract_to.into(),
        }
    }
}

/// Optional integration settings.
///
/// An integration is only offered when it has enough settings to run.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(default)]
pub struct IntegrationSettings {
    /// Program used to gain root privilege.
    pub elevate: String,

    /// Offer to refresh the font cache.
    pub font_cache: bool,

    /// Login shell to switch to.
    pub shell: Option<String>,

    /// GRUB theme to install.
    pub grub_theme: Option<GrubThemeSettings>,

    /// SDDM theme archive to install.
    pub sddm_theme: Option<PathBuf>,

    /// Terminal emulator to make default in file managers.
    pub terminal: Option<String>,

    /// File managers whose default terminal can be set.
    #[serde(rename = "file_manager")]
    pub file_managers: Vec<FileManagerSettings>,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            elevate: "sudo".into(),
            font_cache: true,
            shell: None,
            grub_theme: None,
            sddm_theme: None,
            terminal: None,
            file_managers: vec![
                FileManagerSettings {
                    name: "nemo".into(),
                    schema: "org.cinnamon.desktop.default-applications.terminal".into(),
                    key: "exec".into(),
                },
                FileManagerSettings {
                    name: "nautilus".into(),
                    schema: "com.github.stunkymonkey.nautilus-open-any-terminal".into(),
                    key: "terminal".into(),
                },
            ],
        }
    }
}

/// GRUB theme installation settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct GrubThemeSettings {
    /// Theme directory containing `theme.txt`.
    pub source: PathBuf,

    /// GRUB directory under boot partition.
    #[serde(default = "default_boot_dir")]
    pub boot_dir: PathBuf,
}

/// File manager whose default terminal is a gsettings key.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct FileManagerSettings {
    pub name: String,
    pub schema: String,
    pub key: String,
}

fn default_repository_path() -> PathBuf {
    PathBuf::from("~/.dotfiles")
}

fn default_boot_dir() -> PathBuf {
    PathBuf::from("/boot/grub")
}

fn default_bundles() -> Vec<BundleSettings> {
    vec![
        BundleSettings::new("fonts", ".local/share/fonts/fonts.tar.xz", ".local/share/fonts"),
        BundleSettings::new("gtk-theme", ".themes/gtk-theme.tar.xz", ".themes"),
        BundleSettings::new("icon-theme", ".icons/icon-theme.tar.xz", ".icons"),
        BundleSettings::new("cursor-theme", ".icons/cursor-theme.tar.xz", ".icons"),
    ]
}

fn expand(path: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full(path.to_string_lossy().as_ref())
        .map_err(ConfigError::ShellExpansion)?
        .into_owned();

    Ok(PathBuf::from(expanded))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Repository URL is empty.
    #[error("repository url must not be empty")]
    MissingUrl,
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("HOME", "/home/blah"), ("BLAH", "/srv/blah")])]
    fn deserialize_installer_config() -> anyhow::Result<()> {
        let result: InstallerConfig = indoc! {r#"
            [repository]
            url = "https://blah.org/dotfiles.git"
            path = "$BLAH/dotfiles"
            branch = "main"

            [transfer]
            destination = "~"
            method = "native"
            exclude = ["README.md", "install.sh"]

            [report]
            paths = [".config"]

            [[bundle]]
            name = "fonts"
            archive = "fonts.tar.gz"
            extract_to = ".fonts"

            [integrations]
            elevate = "doas"
            font_cache = false
            shell = "/usr/bin/fish"
            sddm_theme = "themes/sddm.tar.gz"
            terminal = "alacritty"

            [integrations.grub_theme]
            source = "themes/grub"

            [[integrations.file_manager]]
            name = "nemo"
            schema = "org.cinnamon.desktop.default-applications.terminal"
            key = "exec"
        "#}
        .parse()?;

        let expect = InstallerConfig {
            repository: RepositorySettings {
                url: "https://blah.org/dotfiles.git".into(),
                path: "/srv/blah/dotfiles".into(),
                branch: Some("main".into()),
            },
            transfer: TransferSettings {
                destination: "/home/blah".into(),
                method: SyncMethod::Native,
                exclude: vec!["README.md".into(), "install.sh".into()],
            },
            report: ReportSettings {
                paths: vec![".config".into()],
            },
            bundles: vec![BundleSettings::new("fonts", "fonts.tar.gz", ".fonts")],
            integrations: IntegrationSettings {
                elevate: "doas".into(),
                font_cache: false,
                shell: Some("/usr/bin/fish".into()),
                grub_theme: Some(GrubThemeSettings {
                    source: "themes/grub".into(),
                    boot_dir: "/boot/grub".into(),
                }),
                sddm_theme: Some("themes/sddm.tar.gz".into()),
                terminal: Some("alacritty".into()),
                file_managers: vec![FileManagerSettings {
                    name: "nemo".into(),
                    schema: "org.cinnamon.desktop.default-applications.terminal".into(),
                    key: "exec".into(),
                }],
            },
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn minimal_config_uses_defaults() -> anyhow::Result<()> {
        let result: InstallerConfig = indoc! {r#"
            [repository]
            url = "https://blah.org/dotfiles.git"
        "#}
        .parse()?;

        assert_eq!(result.repository.path, PathBuf::from("/home/blah/.dotfiles"));
        assert_eq!(result.transfer.destination, PathBuf::from("/home/blah"));
        assert_eq!(result.transfer.method, SyncMethod::Rsync);
        assert_eq!(result.integrations, IntegrationSettings::default());

        let names: Vec<_> = result.bundles.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["fonts", "gtk-theme", "icon-theme", "cursor-theme"]);

        Ok(())
    }

    #[test]
    fn empty_url_is_rejected() {
        let result = indoc! {r#"
            [repository]
            url = "  "
        "#}
        .parse::<InstallerConfig>();

        assert!(matches!(result, Err(ConfigError::MissingUrl)));
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn derived_paths_resolve_against_destination() -> anyhow::Result<()> {
        let config: InstallerConfig = indoc! {r#"
            [repository]
            url = "https://blah.org/dotfiles.git"

            [transfer]
            exclude = ["README.md", ".git/"]

            [report]
            paths = [".config", "/etc/blah"]

            [[bundle]]
            name = "icons"
            archive = ".icons/icons.tar.xz"
            extract_to = ".icons"
        "#}
        .parse()?;

        assert_eq!(
            config.report_paths(),
            vec![PathBuf::from("/home/blah/.config"), PathBuf::from("/etc/blah")]
        );

        let bundles = config.archive_bundles();
        assert_eq!(
            bundles,
            vec![ArchiveBundle {
                name: "icons".into(),
                archive_path: "/home/blah/.icons/icons.tar.xz".into(),
                extract_to: "/home/blah/.icons".into(),
            }]
        );

        let spec = config.transfer_spec();
        assert_eq!(spec.source, PathBuf::from("/home/blah/.dotfiles"));
        assert_eq!(spec.exclusions, vec![".git/".to_string(), "README.md".to_string()]);

        Ok(())
    }
}
