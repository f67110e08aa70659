// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Disk usage report.
//!
//! Before any file gets copied, the installer shows how much is currently
//! stored at the locations it is about to touch. Missing locations are
//! expected on a fresh machine, so they are reported as "not found" instead of
//! failing the report.
//!
//! Sizes are apparent sizes, i.e., the sum of file lengths, in the same
//! human-readable style as `du -h`.

use ignore::WalkBuilder;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
};
use tracing::warn;

/// Width of the size column.
pub const LABEL_WIDTH: usize = 9;

/// Size column of a report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeLabel {
    /// Total size in bytes.
    Bytes(u64),

    /// Path does not exist.
    NotFound,
}

impl Display for SizeLabel {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Bytes(bytes) => fmt.pad(&human_size(*bytes)),
            Self::NotFound => fmt.pad("not found"),
        }
    }
}

/// Single line of disk usage report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeLine {
    pub label: SizeLabel,
    pub name: String,
}

impl Display for SizeLine {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{:>width$}  {}", self.label, self.name, width = LABEL_WIDTH)
    }
}

/// Report disk usage of each path in order.
///
/// Lazy, each path is only measured once its line is pulled. Never fails.
/// Unreadable entries inside an existing directory are left out of its total.
pub fn report_sizes<I>(paths: I) -> impl Iterator<Item = SizeLine>
where
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    paths.into_iter().map(|path| size_line(path.as_ref()))
}

fn size_line(path: &Path) -> SizeLine {
    let name = path.display().to_string();
    let Ok(meta) = path.symlink_metadata() else {
        warn!("{name} not found");
        return SizeLine {
            label: SizeLabel::NotFound,
            name,
        };
    };

    let bytes = if meta.is_dir() {
        disk_usage(path)
    } else {
        meta.len()
    };

    SizeLine {
        label: SizeLabel::Bytes(bytes),
        name,
    }
}

fn disk_usage(dir: &Path) -> u64 {
    WalkBuilder::new(dir)
        .standard_filters(false)
        .follow_links(false)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_some_and(|kind| kind.is_file()))
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

/// Format byte count the way `du -h` does.
///
/// Sizes are rounded up at the displayed precision, one decimal below ten and
/// none above. Unit is picked after rounding, so a size that rounds up to 1024
/// moves on to the next unit.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["K", "M", "G", "T", "P", "E"];

    if bytes < 1024 {
        return format!("{bytes}B");
    }

    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    loop {
        let shown = round_up(size);
        if shown < 1024.0 || unit == UNITS.len() - 1 {
            return if shown < 10.0 {
                format!("{shown:.1}{}", UNITS[unit])
            } else {
                format!("{shown:.0}{}", UNITS[unit])
            };
        }

        size /= 1024.0;
        unit += 1;
    }
}

fn round_up(size: f64) -> f64 {
    if size < 10.0 {
        (size * 10.0).ceil() / 10.0
    } else {
        size.ceil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;
    use std::{env::current_dir, fs};

    #[test_case(0, "0B"; "empty")]
    #[test_case(1023, "1023B"; "just under a kibibyte")]
    #[test_case(1024, "1.0K"; "one kibibyte")]
    #[test_case(1025, "1.1K"; "rounds up past one kibibyte")]
    #[test_case(1536, "1.5K"; "fractional kibibytes")]
    #[test_case(10 * 1024 - 1, "10K"; "rounding up drops the decimal")]
    #[test_case(10 * 1024 + 1, "11K"; "rounds up whole kibibytes")]
    #[test_case(1024 * 1024 - 1, "1.0M"; "unit picked after rounding")]
    #[test_case(10 * 1024, "10K"; "no decimal past ten")]
    #[test_case(5 * 1024 * 1024, "5.0M"; "mebibytes")]
    #[test_case(3 * 1024 * 1024 * 1024, "3.0G"; "gibibytes")]
    #[test]
    fn human_size_matches_du_style(bytes: u64, expect: &str) {
        use pretty_assertions::assert_eq;
        assert_eq!(human_size(bytes), expect);
    }

    #[sealed_test]
    fn missing_paths_report_not_found() -> anyhow::Result<()> {
        let root = current_dir()?;
        fs::create_dir_all(root.join(".config/kitty"))?;
        fs::write(root.join(".config/kitty/kitty.conf"), vec![b'a'; 1000])?;
        fs::write(root.join(".config/starship.toml"), vec![b'b'; 1048])?;
        fs::write(root.join(".zshrc"), "export EDITOR=nvim\n")?;

        let result: Vec<_> = report_sizes([
            root.join(".config"),
            root.join(".themes"),
            root.join(".zshrc"),
        ])
        .collect();

        assert_eq!(result[0].label, SizeLabel::Bytes(2048));
        assert_eq!(result[1].label, SizeLabel::NotFound);
        assert_eq!(result[2].label, SizeLabel::Bytes(19));
        assert_eq!(result[1].name, root.join(".themes").display().to_string());

        Ok(())
    }

    #[test]
    fn lines_share_column_alignment() {
        let found = SizeLine {
            label: SizeLabel::Bytes(2048),
            name: ".config".into(),
        };
        let missing = SizeLine {
            label: SizeLabel::NotFound,
            name: ".themes".into(),
        };

        assert_eq!(found.to_string(), "     2.0K  .config");
        assert_eq!(missing.to_string(), "not found  .themes");
    }
}
