use crate::desktop::{launcher_path, patch_descriptor_file, write_launcher};
use crate::error::KdeDevError;
use crate::preflight::check_environment;
use crate::runner::{execute, CommandRunner, ExternalCommand};
use crate::steps::{report_done, report_warning, Procedure};
use crate::Context;
use std::path::PathBuf;

/// Fixes ownership of the X11 socket directory at every login.
pub const X11_PERMISSIONS_SCRIPT: &str = "chown -f -R $USER:$USER /tmp/.X11-unix";

#[derive(Debug, Default)]
pub struct SessionState {
    pub overlay_enabled: bool,
    pub launcher: Option<PathBuf>,
}

/// Local staging copy of the descriptor, in the invoking user's home.
pub fn local_descriptor(ctx: &Context) -> PathBuf {
    ctx.user_home.join(ctx.settings.container.desktop_file_name())
}

pub fn start_container<R: CommandRunner>(ctx: &Context, runner: &R) -> Result<(), KdeDevError> {
    let name = ctx.settings.container.name.as_str();
    println!("Starting {name} container...");
    let start = ExternalCommand::new("podman")
        .args(["container", "start", name]);
    execute(ctx, runner, &start, true)?;
    Ok(())
}

pub fn verify_descriptor<R: CommandRunner>(ctx: &Context, runner: &R) -> Result<(), KdeDevError> {
    let container = &ctx.settings.container;
    let exists = ExternalCommand::new("podman")
        .args(["container", "exec", container.name.as_str(), "test", "-f"])
        .arg(container.desktop_file.display().to_string());
    let output = execute(ctx, runner, &exists, false)?;
    if !output.success() {
        return Err(KdeDevError::NotInitialized {
            path: container.desktop_file.clone(),
        });
    }
    report_done("Desktop file found in container");
    Ok(())
}

/// Makes /usr writable until the next reboot. A failure is tolerated: an
/// overlay may already be active.
pub fn enable_usr_overlay<R: CommandRunner>(
    ctx: &Context,
    runner: &R,
) -> Result<bool, KdeDevError> {
    println!("Setting up overlayfs over /usr (temporarily mutable until next reboot)...");
    let overlay = ExternalCommand::sudo("bootc").arg("usr-overlay");
    let output = execute(ctx, runner, &overlay, false)?;
    if output.success() {
        report_done("usr-overlay enabled");
        return Ok(true);
    }
    let stderr = output.stderr_text();
    if stderr.is_empty() {
        report_warning(format!(
            "usr-overlay exited with status {}; continuing",
            output.status_code
        ));
    } else {
        report_warning(format!("usr-overlay not enabled ({stderr}); continuing"));
    }
    Ok(false)
}

pub fn install_x11_script<R: CommandRunner>(
    ctx: &Context,
    runner: &R,
) -> Result<(), KdeDevError> {
    let path = &ctx.settings.paths.x11_script;
    let tee = ExternalCommand::sudo("tee")
        .arg(path.display().to_string())
        .stdin(X11_PERMISSIONS_SCRIPT);
    execute(ctx, runner, &tee, true)?;
    report_done(format!(
        "X11 permissions script written to {}",
        path.display()
    ));
    Ok(())
}

pub fn fetch_descriptor<R: CommandRunner>(
    ctx: &Context,
    runner: &R,
) -> Result<PathBuf, KdeDevError> {
    let container = &ctx.settings.container;
    let local = local_descriptor(ctx);
    let copy = ExternalCommand::new("podman")
        .args(["container", "cp"])
        .arg(format!("{}:{}", container.name, container.desktop_file.display()))
        .arg(local.display().to_string());
    execute(ctx, runner, &copy, true)?;
    report_done(format!("Desktop file copied to {}", local.display()));
    Ok(local)
}

pub fn patch_descriptor(ctx: &Context) -> Result<(), KdeDevError> {
    patch_descriptor_file(&local_descriptor(ctx), &ctx.user_home)?;
    report_done(format!(
        "Exec line now points at {}",
        launcher_path(&ctx.user_home).display()
    ));
    Ok(())
}

pub fn install_descriptor<R: CommandRunner>(
    ctx: &Context,
    runner: &R,
) -> Result<(), KdeDevError> {
    let sessions_dir = ctx.settings.paths.sessions_dir.display().to_string();
    let install = ExternalCommand::sudo("mv")
        .arg(local_descriptor(ctx).display().to_string())
        .arg(sessions_dir.as_str());
    execute(ctx, runner, &install, true)?;
    report_done(format!("Desktop file installed to {sessions_dir}"));
    Ok(())
}

pub fn session_procedure<'a, R, F>(
    ctx: &'a Context,
    runner: &'a R,
    is_available: F,
) -> Procedure<'a, SessionState>
where
    R: CommandRunner,
    F: Fn(&str) -> bool + 'a,
{
    Procedure::new("KDE Session Installation", ctx.interrupt.clone())
        .step("check environment", move |_: &mut SessionState| {
            check_environment(ctx, is_available)
        })
        .step("start container", move |_: &mut SessionState| {
            start_container(ctx, runner)
        })
        .step("verify desktop file", move |_: &mut SessionState| {
            verify_descriptor(ctx, runner)
        })
        .step("enable usr overlay", move |state: &mut SessionState| {
            state.overlay_enabled = enable_usr_overlay(ctx, runner)?;
            Ok(())
        })
        .step("install X11 permissions script", move |_: &mut SessionState| {
            install_x11_script(ctx, runner)
        })
        .step("fetch desktop file", move |_: &mut SessionState| {
            fetch_descriptor(ctx, runner).map(|_| ())
        })
        .step("patch desktop file", move |_: &mut SessionState| {
            patch_descriptor(ctx)
        })
        .step("install desktop file", move |_: &mut SessionState| {
            install_descriptor(ctx, runner)
        })
        .step("write session launcher", move |state: &mut SessionState| {
            let path = write_launcher(&ctx.user_home)?;
            report_done(format!("Session launcher written to {}", path.display()));
            state.launcher = Some(path);
            Ok(())
        })
}

pub fn run_install_session<R, F>(
    ctx: &Context,
    runner: &R,
    is_available: F,
) -> Result<SessionState, KdeDevError>
where
    R: CommandRunner,
    F: Fn(&str) -> bool,
{
    let mut state = SessionState::default();
    session_procedure(ctx, runner, is_available).run(&mut state)?;

    println!("\n{}", "=".repeat(30));
    report_done("KDE session installation completed!");
    println!("Log out to see the Plasma development session in the display manager.");
    println!(
        "The /usr overlay does not survive a reboot; \
         run install-session again after rebooting."
    );
    Ok(state)
}
