use crate::error::{Result, TreefenceError};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Glyph set used to draw tree connectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeStyle {
    /// Box-drawing characters (same as `ansi`)
    #[default]
    Default,
    /// Box-drawing characters
    Ansi,
    /// Plain ASCII characters
    Ascii,
    /// Box-drawing characters with a rounded last-entry corner
    Rounded,
    /// Indentation only
    Spaces,
}

/// Connector strings for the structural roles of a tree line.
///
/// Every glyph has the same display width so nested prefixes line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyphs {
    /// Entry with more siblings below it
    pub branch: &'static str,
    /// Final entry of a directory
    pub last: &'static str,
    /// Indentation under an ancestor that has more siblings
    pub vertical: &'static str,
    /// Indentation under an ancestor that was the final entry
    pub blank: &'static str,
}

const BOX: Glyphs = Glyphs {
    branch: "├── ",
    last: "└── ",
    vertical: "│   ",
    blank: "    ",
};

const ASCII: Glyphs = Glyphs {
    branch: "|-- ",
    last: "`-- ",
    vertical: "|   ",
    blank: "    ",
};

const ROUNDED: Glyphs = Glyphs {
    branch: "├── ",
    last: "╰── ",
    vertical: "│   ",
    blank: "    ",
};

const SPACES: Glyphs = Glyphs {
    branch: "    ",
    last: "    ",
    vertical: "    ",
    blank: "    ",
};

impl TreeStyle {
    pub const ALL: [Self; 5] = [
        Self::Default,
        Self::Ansi,
        Self::Ascii,
        Self::Rounded,
        Self::Spaces,
    ];

    #[must_use]
    pub const fn glyphs(self) -> Glyphs {
        match self {
            Self::Default | Self::Ansi => BOX,
            Self::Ascii => ASCII,
            Self::Rounded => ROUNDED,
            Self::Spaces => SPACES,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Ansi => "ansi",
            Self::Ascii => "ascii",
            Self::Rounded => "rounded",
            Self::Spaces => "spaces",
        }
    }
}

impl fmt::Display for TreeStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TreeStyle {
    type Err = TreefenceError;

    /// Parses a style key. An empty key selects the default style.
    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim();
        if key.is_empty() {
            return Ok(Self::Default);
        }
        Self::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(key))
            .ok_or_else(|| {
                TreefenceError::config(
                    "style",
                    format!("unknown style `{key}` (expected one of: default, ansi, ascii, rounded, spaces)"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_known_styles() {
        for style in TreeStyle::ALL {
            assert_eq!(style.name().parse::<TreeStyle>().unwrap(), style);
        }
        assert_eq!("ASCII".parse::<TreeStyle>().unwrap(), TreeStyle::Ascii);
        assert_eq!("".parse::<TreeStyle>().unwrap(), TreeStyle::Default);
    }

    #[test]
    fn test_parse_unknown_style() {
        let err = "bogus".parse::<TreeStyle>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_default_matches_ansi() {
        assert_eq!(TreeStyle::Default.glyphs(), TreeStyle::Ansi.glyphs());
        assert_eq!(TreeStyle::default(), TreeStyle::Default);
    }

    #[test]
    fn test_glyph_widths_align() {
        for style in TreeStyle::ALL {
            let g = style.glyphs();
            let width = g.branch.chars().count();
            assert_eq!(g.last.chars().count(), width, "{style}");
            assert_eq!(g.vertical.chars().count(), width, "{style}");
            assert_eq!(g.blank.chars().count(), width, "{style}");
        }
    }

    #[test]
    fn test_rounded_corner() {
        assert_eq!(TreeStyle::Rounded.glyphs().last, "╰── ");
        assert_eq!(TreeStyle::Spaces.glyphs().branch.trim(), "");
    }

    #[test]
    fn test_deserialize_style() {
        let style: TreeStyle = serde_json::from_str("\"rounded\"").unwrap();
        assert_eq!(style, TreeStyle::Rounded);
    }
}
