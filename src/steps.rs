use crate::error::KdeDevError;
use crate::interrupt::Interrupt;
use dialoguer::console::style;

type Action<'a, S> = Box<dyn FnOnce(&mut S) -> Result<(), KdeDevError> + 'a>;

pub struct Step<'a, S> {
    pub name: &'static str,
    action: Action<'a, S>,
}

/// An ordered list of steps run against shared state. The first failure
/// stops the run and is wrapped with the failing step's name.
pub struct Procedure<'a, S> {
    title: &'static str,
    interrupt: Interrupt,
    steps: Vec<Step<'a, S>>,
}

impl<'a, S> Procedure<'a, S> {
    pub fn new(title: &'static str, interrupt: Interrupt) -> Self {
        Self {
            title,
            interrupt,
            steps: Vec::new(),
        }
    }

    pub fn step<F>(mut self, name: &'static str, action: F) -> Self
    where
        F: FnOnce(&mut S) -> Result<(), KdeDevError> + 'a,
    {
        self.steps.push(Step {
            name,
            action: Box::new(action),
        });
        self
    }

    #[cfg(test)]
    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|step| step.name).collect()
    }

    pub fn run(self, state: &mut S) -> Result<(), KdeDevError> {
        println!("{}", style(self.title).bold().cyan());
        println!("{}", "=".repeat(self.title.chars().count()));
        let total = self.steps.len();
        for (index, Step { name, action }) in self.steps.into_iter().enumerate() {
            let wrap = |source: KdeDevError| KdeDevError::Step {
                step: name,
                source: Box::new(source),
            };
            if self.interrupt.is_raised() {
                return Err(wrap(KdeDevError::Interrupted));
            }
            println!(
                "{}",
                style(format!("[{}/{}] {}", index + 1, total, name)).dim()
            );
            action(state).map_err(wrap)?;
        }
        Ok(())
    }
}

pub fn report_done(message: impl AsRef<str>) {
    println!("{} {}", style("✓").green(), message.as_ref());
}

pub fn report_warning(message: impl AsRef<str>) {
    println!(
        "{} {}",
        style("!").yellow(),
        style(message.as_ref()).yellow()
    );
}
