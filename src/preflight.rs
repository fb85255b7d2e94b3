use crate::error::KdeDevError;
use crate::Context;

pub fn tool_on_path(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Runs before anything is mutated: refuses the superuser (escalation happens
/// per command through sudo) and requires every configured tool on PATH.
pub fn check_environment<F>(ctx: &Context, is_available: F) -> Result<(), KdeDevError>
where
    F: Fn(&str) -> bool,
{
    if ctx.identity.is_superuser() {
        return Err(KdeDevError::Precondition(
            "this program should not be run as root; it escalates with sudo where needed"
                .to_string(),
        ));
    }
    for tool in &ctx.settings.container.required_tools {
        if !is_available(tool) {
            return Err(KdeDevError::Precondition(format!(
                "{tool} not found. Please install it first."
            )));
        }
    }
    Ok(())
}

pub fn check_build_config(ctx: &Context) -> Result<(), KdeDevError> {
    let source = ctx.build_config_source();
    if !source.is_file() {
        return Err(KdeDevError::Precondition(format!(
            "{} not found in current directory",
            source.display()
        )));
    }
    Ok(())
}
