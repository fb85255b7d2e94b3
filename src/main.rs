mod desktop;
mod error;
mod init;
mod interrupt;
mod preflight;
mod runner;
mod session;
mod settings;
mod steps;

use clap::{CommandFactory, Parser, Subcommand};
use dialoguer::console::style;
use dirs::home_dir;
use error::KdeDevError;
use interrupt::Interrupt;
use runner::SystemRunner;
use settings::{load_settings, Settings};
use std::env;
use std::path::PathBuf;

const EXAMPLES: &str = "\
Examples:
  kde-dev init                Initialize the development environment
  kde-dev install-session     Install KDE session from development build";

#[derive(Parser, Debug)]
#[command(
    name = "kde-dev",
    version,
    about = "KDE Plasma development environment in a distrobox container",
    after_help = EXAMPLES
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Initialize the KDE development environment
    Init,
    /// Install KDE session from development build
    InstallSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    /// Real uid, used for ownership and inside the container.
    pub uid: u32,
    pub euid: u32,
}

impl Identity {
    pub fn current() -> Self {
        // SAFETY: getuid and geteuid cannot fail and touch no memory.
        unsafe {
            Self {
                uid: libc::getuid(),
                euid: libc::geteuid(),
            }
        }
    }

    pub fn is_superuser(&self) -> bool {
        self.euid == 0
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub identity: Identity,
    /// Home of the invoking user on the host (not the container home).
    pub user_home: PathBuf,
    /// Directory the program was invoked from.
    pub work_dir: PathBuf,
    pub interrupt: Interrupt,
}

impl Context {
    pub fn build_config_source(&self) -> PathBuf {
        self.work_dir.join(&self.settings.paths.build_config)
    }
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    let Some(command) = cli.command else {
        let _ = Cli::command().print_long_help();
        std::process::exit(1);
    };

    if let Err(err) = run(command) {
        if err.is_interrupted() {
            eprintln!("\n{}", style("Interrupted by user").yellow());
        } else {
            eprintln!("{} {err}", style("Error:").red().bold());
        }
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), KdeDevError> {
    let ctx = build_context()?;
    let runner = SystemRunner;
    match command {
        Commands::Init => {
            init::run_init(&ctx, &runner, preflight::tool_on_path)?;
        }
        Commands::InstallSession => {
            session::run_install_session(&ctx, &runner, preflight::tool_on_path)?;
        }
    }
    Ok(())
}

fn build_context() -> Result<Context, KdeDevError> {
    let settings = load_settings()?;
    let user_home = home_dir().ok_or_else(|| {
        KdeDevError::Config("could not determine the home directory".to_string())
    })?;
    let work_dir = env::current_dir()?;
    let interrupt = Interrupt::install()?;
    Ok(Context {
        settings,
        identity: Identity::current(),
        user_home,
        work_dir,
        interrupt,
    })
}

/// Context rooted in `root`, for an unprivileged uid 1000 user.
#[cfg(test)]
pub(crate) fn test_context(root: &std::path::Path) -> Context {
    let mut settings = Settings::default();
    settings.paths.home_dir = root.join("var/local/kde-dev/home");
    settings.paths.kde_dir = root.join("var/local/kde-dev/kde");
    settings.paths.x11_script = root.join("etc/profile.d/set_tmp_x11_permissions.sh");
    settings.paths.sessions_dir = root.join("usr/share/wayland-sessions");
    Context {
        settings,
        identity: Identity {
            uid: 1000,
            euid: 1000,
        },
        user_home: root.join("home/user"),
        work_dir: root.join("work"),
        interrupt: Interrupt::default(),
    }
}
