use crate::error::KdeDevError;
use crate::preflight::{check_build_config, check_environment};
use crate::runner::{execute, CommandRunner, ExternalCommand};
use crate::steps::{report_done, Procedure};
use crate::Context;
use dialoguer::console::style;
use std::fs;
use std::path::PathBuf;

const BUILD_PIPELINE: &str = "yes | kde-builder workspace";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedDirs {
    pub home_dir: PathBuf,
    pub kde_dir: PathBuf,
}

#[derive(Debug, Default)]
pub struct InitState {
    pub dirs: Option<ProvisionedDirs>,
}

/// Creates the home and kde trees as root, hands them to the invoking user,
/// then creates `.config` unprivileged.
pub fn setup_directories<R: CommandRunner>(
    ctx: &Context,
    runner: &R,
) -> Result<ProvisionedDirs, KdeDevError> {
    let paths = &ctx.settings.paths;
    let home_dir = paths.home_dir.display().to_string();
    let kde_dir = paths.kde_dir.display().to_string();

    let mkdir = ExternalCommand::sudo("mkdir")
        .args(["-p", home_dir.as_str(), kde_dir.as_str()]);
    execute(ctx, runner, &mkdir, true)?;

    let owner = format!("{uid}:{uid}", uid = ctx.identity.uid);
    let chown = ExternalCommand::sudo("chown")
        .arg(owner)
        .args([home_dir.as_str(), kde_dir.as_str()]);
    execute(ctx, runner, &chown, true)?;

    fs::create_dir_all(paths.config_dir())?;

    report_done(format!("Created directories: {home_dir}, {kde_dir}"));
    Ok(ProvisionedDirs {
        home_dir: paths.home_dir.clone(),
        kde_dir: paths.kde_dir.clone(),
    })
}

/// Copies the build configuration with its permissions and modification time.
pub fn copy_build_config(ctx: &Context) -> Result<PathBuf, KdeDevError> {
    check_build_config(ctx)?;
    let source = ctx.build_config_source();
    let target = ctx.settings.paths.build_config_target();
    fs::copy(&source, &target)?;
    let modified = fs::metadata(&source)?.modified()?;
    fs::File::options()
        .write(true)
        .open(&target)?
        .set_modified(modified)?;
    report_done(format!(
        "Copied {} to {}",
        source.display(),
        target.display()
    ));
    Ok(target)
}

pub fn create_container<R: CommandRunner>(ctx: &Context, runner: &R) -> Result<(), KdeDevError> {
    let container = &ctx.settings.container;
    let mut create = ExternalCommand::new("distrobox")
        .args(["create", "--name", container.name.as_str(), "--home"])
        .arg(ctx.settings.paths.home_dir.display().to_string())
        .arg("--init");
    for package in &container.additional_packages {
        create = create.args(["--additional-packages", package.as_str()]);
    }
    create = create.args(["--pull", "--image"]).arg(&container.image);
    execute(ctx, runner, &create, true)?;
    report_done(format!("Created distrobox container '{}'", container.name));
    Ok(())
}

/// Wipes the container's cache for a cold build, then runs the workspace
/// build inside the container with every prompt answered.
pub fn build_workspace<R: CommandRunner>(ctx: &Context, runner: &R) -> Result<(), KdeDevError> {
    let notice = "Plasma Desktop will now be built from master. This will take a while.";
    println!("\n{}\n", style(notice).bold());

    let cache_dir = ctx.settings.paths.cache_dir();
    if cache_dir.exists() {
        let clear = ExternalCommand::sudo("rm")
            .arg("-rf")
            .arg(cache_dir.display().to_string());
        execute(ctx, runner, &clear, true)?;
        report_done("Cleared cache directory");
    }

    let name = ctx.settings.container.name.as_str();
    let build = ExternalCommand::new("podman")
        .args(["exec", "-it", "--user"])
        .arg(ctx.identity.uid.to_string())
        .args([name, "bash", "-c", BUILD_PIPELINE])
        .streamed();
    execute(ctx, runner, &build, true)?;
    report_done("KDE build completed");
    Ok(())
}

pub fn init_procedure<'a, R, F>(
    ctx: &'a Context,
    runner: &'a R,
    is_available: F,
) -> Procedure<'a, InitState>
where
    R: CommandRunner,
    F: Fn(&str) -> bool + 'a,
{
    Procedure::new(
        "KDE Development Environment Initialization",
        ctx.interrupt.clone(),
    )
    .step("check environment", move |_: &mut InitState| {
        check_environment(ctx, is_available)?;
        check_build_config(ctx)
    })
    .step("set up directories", move |state: &mut InitState| {
        state.dirs = Some(setup_directories(ctx, runner)?);
        Ok(())
    })
    .step("copy build configuration", move |_: &mut InitState| {
        copy_build_config(ctx).map(|_| ())
    })
    .step("create container", move |_: &mut InitState| {
        create_container(ctx, runner)
    })
    .step("build workspace", move |_: &mut InitState| {
        build_workspace(ctx, runner)
    })
}

pub fn run_init<R, F>(
    ctx: &Context,
    runner: &R,
    is_available: F,
) -> Result<InitState, KdeDevError>
where
    R: CommandRunner,
    F: Fn(&str) -> bool,
{
    let mut state = InitState::default();
    init_procedure(ctx, runner, is_available).run(&mut state)?;

    println!("\n{}", "=".repeat(40));
    report_done("KDE development environment setup completed!");
    report_done(format!("Container name: {}", ctx.settings.container.name));
    if let Some(dirs) = &state.dirs {
        report_done(format!("Home directory: {}", dirs.home_dir.display()));
        report_done(format!("KDE directory: {}", dirs.kde_dir.display()));
    }
    println!("\nTo enter the development environment, run:");
    println!("  distrobox enter {}", ctx.settings.container.name);
    Ok(state)
}
