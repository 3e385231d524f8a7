//! UI Theme - colors, icons and column widths shared by every renderer.

use crossterm::style::Color;

#[derive(Debug, Clone)]
pub struct Theme {
    pub colors: ColorScheme,
    pub icons: Icons,
    pub layout: Layout,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            colors: ColorScheme::default(),
            icons: Icons::default(),
            layout: Layout::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub package_name: Color,
    pub version: Color,
    pub secondary: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            package_name: Color::Cyan,
            version: Color::White,
            secondary: Color::DarkGrey,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Icons {
    pub pending: &'static str,
    pub active: &'static str,
    pub success: &'static str,
    pub error: &'static str,
    pub warning: &'static str,
    pub info: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            pending: "○",
            active: "●",
            success: "✓",
            error: "✗",
            warning: "⚠",
            info: "ℹ",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub name_width: usize,
    pub version_width: usize,
    pub platform_width: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            name_width: 16,
            version_width: 10,
            platform_width: 14,
        }
    }
}

/// Human readable byte count.
pub fn format_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else if kb >= 1024.0 {
        format!("{mb:.1} MB")
    } else if kb >= 1.0 {
        format!("{kb:.1} KB")
    } else {
        format!("{bytes} B")
    }
}
