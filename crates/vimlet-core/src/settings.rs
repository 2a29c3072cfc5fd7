//! Typed access to the host's named string settings.
//!
//! The host owns storage and persistence; the engine only reads a handful
//! of feature toggles through these helpers and is notified of changes via
//! [`crate::session::EditorSession::setting_changed`].

use crate::host::HostEditor;

/// Use the internal commandline for `:` instead of the host palette.
pub const COMMANDLINE_MODE: &str = "vim.commandline";
/// Number of spaces one indent level inserts.
pub const INDENT_WIDTH: &str = "vim.indent-width";
/// Prefix toggled by the comment command.
pub const COMMENT_PREFIX: &str = "vim.comment-prefix";

pub fn commandline_enabled(host: &dyn HostEditor) -> bool {
    bool_setting(host, COMMANDLINE_MODE, true)
}

pub fn indent_width(host: &dyn HostEditor) -> usize {
    host.setting(INDENT_WIDTH)
        .and_then(|v| v.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or(4)
}

pub fn comment_prefix(host: &dyn HostEditor) -> String {
    host.setting(COMMENT_PREFIX).unwrap_or_else(|| "// ".to_string())
}

fn bool_setting(host: &dyn HostEditor, name: &str, default: bool) -> bool {
    match host.setting(name) {
        Some(v) => matches!(v.as_str(), "true" | "1" | "on" | "yes"),
        None => default,
    }
}
