// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Optional system integrations.
//!
//! An __integration__ is a system-level customization that lives outside of
//! the home directory, e.g., the login shell, or the bootloader theme. Each
//! integration is offered to the user on its own, and is only applied after
//! explicit confirmation.
//!
//! Integrations are described as a plan of program invocations. Planning is
//! pure, so what an integration would do can be inspected without running
//! anything. Steps that need root privilege are wrapped in the configured
//! elevation program, which takes care of asking for credentials.
//!
//! # Integration Order
//!
//! Integrations are always offered in this order, skipping any that lack the
//! settings they need:
//!
//! 1. Font cache refresh.
//! 2. Login shell change.
//! 3. GRUB theme.
//! 4. SDDM theme.
//! 5. Default terminal, once per configured file manager.

use crate::{
    config::{GrubThemeSettings, IntegrationSettings},
    tool::Invocation,
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};

/// Location of GRUB's default settings.
pub const GRUB_DEFAULTS: &str = "/etc/default/grub";

/// Kind of system integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationKind {
    FontCache,
    LoginShell,
    GrubTheme,
    SddmTheme,
    FileManagerTerminal,
}

impl Display for IntegrationKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::FontCache => "font-cache",
            Self::LoginShell => "login-shell",
            Self::GrubTheme => "grub-theme",
            Self::SddmTheme => "sddm-theme",
            Self::FileManagerTerminal => "file-manager-terminal",
        };
        fmt.write_str(name)
    }
}

/// Planned system integration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Integration {
    pub kind: IntegrationKind,
    pub question: String,
    pub plan: Vec<Invocation>,
}

impl Integration {
    /// Plan every integration that settings allow, in offering order.
    ///
    /// Relative theme paths are resolved against the repository checkout.
    pub fn plan_all(settings: &IntegrationSettings, checkout: &Path) -> Vec<Self> {
        let mut integrations = Vec::new();

        if settings.font_cache {
            integrations.push(Self::font_cache());
        }

        if let Some(shell) = &settings.shell {
            integrations.push(Self::login_shell(shell));
        }

        if let Some(grub) = &settings.grub_theme {
            integrations.push(Self::grub_theme(grub, checkout, &settings.elevate));
        }

        if let Some(archive) = &settings.sddm_theme {
            integrations.push(Self::sddm_theme(&checkout.join(archive), &settings.elevate));
        }

        if let Some(terminal) = &settings.terminal {
            for manager in &settings.file_managers {
                integrations.push(Self {
                    kind: IntegrationKind::FileManagerTerminal,
                    question: format!("Use {terminal} as default terminal in {}?", manager.name),
                    plan: vec![Invocation::new(
                        "gsettings",
                        ["set", manager.schema.as_str(), manager.key.as_str(), terminal.as_str()],
                    )],
                });
            }
        }

        integrations
    }

    fn font_cache() -> Self {
        Self {
            kind: IntegrationKind::FontCache,
            question: "Refresh font cache?".into(),
            plan: vec![Invocation::new("fc-cache", ["-f"])],
        }
    }

    fn login_shell(shell: &str) -> Self {
        Self {
            kind: IntegrationKind::LoginShell,
            question: format!("Change login shell to {shell}?"),
            plan: vec![Invocation::new("chsh", ["-s", shell])],
        }
    }

    fn grub_theme(grub: &GrubThemeSettings, checkout: &Path, elevate: &str) -> Self {
        let source = checkout.join(&grub.source);
        let themes = grub.boot_dir.join("themes");
        let name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let theme_txt = themes.join(&name).join("theme.txt");

        // INVARIANT: Theme path goes in as positional argument, never spliced into script.
        let script = format!(
            "sed -i -E '/^#?GRUB_THEME=/d' {GRUB_DEFAULTS} && \
             printf 'GRUB_THEME=\"%s\"\\n' \"$1\" >> {GRUB_DEFAULTS}"
        );

        let plan = vec![
            Invocation::new("mkdir", ["-p".into(), themes.clone().into_os_string()]),
            Invocation::new(
                "cp",
                [
                    "-r".into(),
                    source.clone().into_os_string(),
                    themes.clone().into_os_string(),
                ],
            ),
            Invocation::new(
                "sh",
                [
                    "-c".into(),
                    script.into(),
                    "sh".into(),
                    theme_txt.into_os_string(),
                ],
            ),
            Invocation::new(
                "grub-mkconfig",
                ["-o".into(), grub.boot_dir.join("grub.cfg").into_os_string()],
            ),
        ]
        .into_iter()
        .map(|step| step.elevated(elevate))
        .collect();

        Self {
            kind: IntegrationKind::GrubTheme,
            question: format!("Install GRUB theme {name:?}? (requires root)"),
            plan,
        }
    }

    fn sddm_theme(archive: &Path, elevate: &str) -> Self {
        Self {
            kind: IntegrationKind::SddmTheme,
            question: format!(
                "Install SDDM theme from {:?}? (requires root)",
                archive.display()
            ),
            plan: vec![Invocation::new(
                "sddmthemeinstaller",
                ["-i".into(), archive.as_os_str().to_owned()],
            )
            .elevated(elevate)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileManagerSettings;
    use pretty_assertions::assert_eq;

    fn kinds(integrations: &[Integration]) -> Vec<IntegrationKind> {
        integrations.iter().map(|integration| integration.kind).collect()
    }

    #[test]
    fn default_settings_only_offer_font_cache() {
        let result = Integration::plan_all(&IntegrationSettings::default(), Path::new("/repo"));
        assert_eq!(kinds(&result), vec![IntegrationKind::FontCache]);
        assert_eq!(result[0].plan, vec![Invocation::new("fc-cache", ["-f"])]);
    }

    #[test]
    fn full_settings_keep_offering_order() {
        let settings = IntegrationSettings {
            shell: Some("/usr/bin/zsh".into()),
            grub_theme: Some(GrubThemeSettings {
                source: "themes/vimix".into(),
                boot_dir: "/boot/grub".into(),
            }),
            sddm_theme: Some("themes/sugar.tar.gz".into()),
            terminal: Some("kitty".into()),
            ..IntegrationSettings::default()
        };
        let result = Integration::plan_all(&settings, Path::new("/repo"));

        assert_eq!(
            kinds(&result),
            vec![
                IntegrationKind::FontCache,
                IntegrationKind::LoginShell,
                IntegrationKind::GrubTheme,
                IntegrationKind::SddmTheme,
                IntegrationKind::FileManagerTerminal,
                IntegrationKind::FileManagerTerminal,
            ]
        );

        assert_eq!(
            result[1].plan,
            vec![Invocation::new("chsh", ["-s", "/usr/bin/zsh"])]
        );
        assert_eq!(
            result[3].plan,
            vec![Invocation::new(
                "sudo",
                ["sddmthemeinstaller", "-i", "/repo/themes/sugar.tar.gz"]
            )]
        );
        assert_eq!(
            result[4].plan,
            vec![Invocation::new(
                "gsettings",
                [
                    "set",
                    "org.cinnamon.desktop.default-applications.terminal",
                    "exec",
                    "kitty"
                ]
            )]
        );
    }

    #[test]
    fn grub_theme_plan_is_fully_elevated() {
        let grub = GrubThemeSettings {
            source: "/srv/themes/vimix".into(),
            boot_dir: "/boot/grub2".into(),
        };
        let result = Integration::grub_theme(&grub, Path::new("/repo"), "doas");

        assert!(result.plan.iter().all(|step| step.program == "doas"));
        assert_eq!(
            result.plan[0],
            Invocation::new("doas", ["mkdir", "-p", "/boot/grub2/themes"])
        );
        assert_eq!(
            result.plan[1],
            Invocation::new("doas", ["cp", "-r", "/srv/themes/vimix", "/boot/grub2/themes"])
        );
        assert_eq!(
            result.plan[2].args.last().map(|arg| arg.to_string_lossy().into_owned()),
            Some("/boot/grub2/themes/vimix/theme.txt".to_string())
        );
        assert_eq!(
            result.plan[3],
            Invocation::new("doas", ["grub-mkconfig", "-o", "/boot/grub2/grub.cfg"])
        );
    }

    #[test]
    fn file_managers_need_terminal() {
        let settings = IntegrationSettings {
            font_cache: false,
            terminal: None,
            file_managers: vec![FileManagerSettings {
                name: "nemo".into(),
                schema: "org.cinnamon.desktop.default-applications.terminal".into(),
                key: "exec".into(),
            }],
            ..IntegrationSettings::default()
        };

        assert!(Integration::plan_all(&settings, Path::new("/repo")).is_empty());
    }
}
