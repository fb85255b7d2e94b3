//! Session descriptor patching and the launcher it points at.

use crate::error::KdeDevError;
use std::fs;
use std::path::{Path, PathBuf};

const EXEC_PREFIX: &str = "Exec=";
const LAUNCHER_NAME: &str = "start-plasma-dev-session";
const LAUNCHER_MODE: u32 = 0o755;

pub fn launcher_dir(home: &Path) -> PathBuf {
    home.join(".local").join("bin")
}

pub fn launcher_path(home: &Path) -> PathBuf {
    launcher_dir(home).join(LAUNCHER_NAME)
}

/// Replaces the first `Exec=` line, leaving every other line byte-identical.
/// Returns `None` when the descriptor has no `Exec=` line.
pub fn patch_exec_line(content: &str, exec: &Path) -> Option<String> {
    let replacement = format!("{EXEC_PREFIX}{}", exec.display());
    let mut lines: Vec<&str> = content.split('\n').collect();
    let index = lines.iter().position(|line| line.starts_with(EXEC_PREFIX))?;
    lines[index] = &replacement;
    Some(lines.join("\n"))
}

/// Points the descriptor at the launcher under `home`, rewriting it in place.
/// A descriptor without an `Exec=` line is left untouched and rejected.
pub fn patch_descriptor_file(path: &Path, home: &Path) -> Result<(), KdeDevError> {
    let content = fs::read_to_string(path)?;
    let patched = patch_exec_line(&content, &launcher_path(home))
        .ok_or_else(|| KdeDevError::MissingExecLine {
            path: path.to_path_buf(),
        })?;
    fs::write(path, patched)?;
    Ok(())
}

pub fn launcher_script(home: &Path) -> String {
    let libexec = home.join("kde").join("usr").join("lib64").join("libexec");
    format!(
        "{kactivitymanagerd} & disown\n{run_session} {startplasma} -wayland\n",
        kactivitymanagerd = libexec.join("kactivitymanagerd").display(),
        run_session = libexec.join("plasma-dbus-run-session-if-needed").display(),
        startplasma = libexec.join("startplasma-dev.sh").display(),
    )
}

pub fn write_launcher(home: &Path) -> Result<PathBuf, KdeDevError> {
    fs::create_dir_all(launcher_dir(home))?;
    let path = launcher_path(home);
    fs::write(&path, launcher_script(home))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(LAUNCHER_MODE))?;
    }
    Ok(path)
}
