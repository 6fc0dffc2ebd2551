use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use crate::IacFormat;

/// Outcome of a best-effort CLI validation pass. A missing binary is not an
/// error: `cli_present` stays false and the caller decides what to surface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationOutcome {
    pub cli_present: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

fn cli_path(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

// Extra files land inside the scratch directory, never outside it.
fn plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && name != "." && name != ".."
}

fn scratch_dir() -> PathBuf {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let seq = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    std::env::temp_dir().join(format!("blueprint-validate-{}-{}", std::process::id(), seq))
}

/// Run lightweight CLI validation for generated Bicep or Terraform.
///
/// Bicep: `bicep build` on a scratch file; a non-zero exit collects stderr as
/// errors. Terraform: `terraform fmt -check` on a scratch directory holding
/// `main.tf` plus any `extra_files` (e.g. `backend.tf`, `variables.tf`);
/// formatting complaints are reported as warnings, not errors. Extra file
/// names must be plain file names, with no path components.
pub fn validate_with_cli(
    format: IacFormat,
    content: &str,
    extra_files: &[(String, String)],
) -> ValidationOutcome {
    let mut res = ValidationOutcome::default();

    let binary = match format {
        IacFormat::Bicep => cli_path("bicep"),
        IacFormat::Terraform => cli_path("terraform"),
    };
    let Some(binary) = binary else {
        return res;
    };
    res.cli_present = true;

    let dir = scratch_dir();
    if let Err(e) = fs::create_dir_all(&dir) {
        res.errors.push(e.to_string());
        return res;
    }

    match format {
        IacFormat::Bicep => {
            let file = dir.join("main.bicep");
            if let Err(e) = fs::write(&file, content) {
                res.errors.push(e.to_string());
            } else {
                match Command::new(&binary).arg("build").arg(&file).output() {
                    Ok(output) => {
                        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
                        if !output.status.success() {
                            res.errors
                                .push(if stderr.is_empty() { stdout } else { stderr });
                        } else if !stdout.is_empty() {
                            res.warnings.push(stdout);
                        }
                    }
                    Err(e) => res.errors.push(e.to_string()),
                }
            }
        }
        IacFormat::Terraform => {
            let mut write_err = None;
            if let Err(e) = fs::write(dir.join("main.tf"), content) {
                write_err = Some(e.to_string());
            }
            for (name, body) in extra_files {
                if !plain_file_name(name) {
                    write_err = Some(format!("invalid extra file name: {name:?}"));
                } else if let Err(e) = fs::write(dir.join(name), body) {
                    write_err = Some(e.to_string());
                }
            }
            if let Some(e) = write_err {
                res.errors.push(e);
            } else {
                match Command::new(&binary)
                    .arg("fmt")
                    .arg("-check")
                    .arg(&dir)
                    .output()
                {
                    Ok(output) => {
                        if !output.status.success() {
                            let stdout =
                                String::from_utf8_lossy(&output.stdout).trim().to_string();
                            let stderr =
                                String::from_utf8_lossy(&output.stderr).trim().to_string();
                            res.warnings
                                .push(if stdout.is_empty() { stderr } else { stdout });
                        }
                    }
                    Err(e) => res.errors.push(e.to_string()),
                }
            }
        }
    }

    let _ = fs::remove_dir_all(&dir);
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_is_not_an_error() {
        assert!(cli_path("blueprint-no-such-binary-xyz").is_none());
    }

    #[test]
    fn scratch_dirs_are_distinct() {
        assert_ne!(scratch_dir(), scratch_dir());
    }

    #[test]
    fn extra_file_names_must_be_plain() {
        assert!(plain_file_name("variables.tf"));
        assert!(plain_file_name("backend.tf"));
        assert!(!plain_file_name("../outside.tf"));
        assert!(!plain_file_name("sub/dir.tf"));
        assert!(!plain_file_name("..\\outside.tf"));
        assert!(!plain_file_name(".."));
        assert!(!plain_file_name(""));
    }
}
