use anyhow::Result;
use dialoguer::{Input, Select, theme::ColorfulTheme};
use tracing::info;

/// User interaction consumed by the scenario driver: prompt for a non-empty
/// string, pick one entry from a list, and pause before a named demo step.
pub trait Interact {
  fn ask_non_empty(&mut self, prompt: &str) -> Result<String>;
  /// Returns the index of the chosen item. `items` must be non-empty.
  fn choose(&mut self, prompt: &str, items: &[String]) -> Result<usize>;
  fn pause(&mut self, title: &str) -> Result<()>;
}

/// Terminal implementation over dialoguer.
pub struct Terminal {
  theme: ColorfulTheme,
}

impl Terminal {
  pub fn new() -> Self {
    Terminal {
      theme: ColorfulTheme::default(),
    }
  }
}

impl Default for Terminal {
  fn default() -> Self {
    Self::new()
  }
}

impl Interact for Terminal {
  fn ask_non_empty(&mut self, prompt: &str) -> Result<String> {
    let value: String = Input::with_theme(&self.theme)
      .with_prompt(prompt)
      .validate_with(|input: &String| {
        if input.trim().is_empty() {
          Err("a value is required")
        } else {
          Ok(())
        }
      })
      .interact_text()?;
    Ok(value.trim().to_string())
  }

  fn choose(&mut self, prompt: &str, items: &[String]) -> Result<usize> {
    let index = Select::with_theme(&self.theme)
      .with_prompt(prompt)
      .items(items)
      .default(0)
      .interact()?;
    Ok(index)
  }

  fn pause(&mut self, title: &str) -> Result<()> {
    println!("{}", "-".repeat(88));
    let _: String = Input::with_theme(&self.theme)
      .with_prompt(format!("{title} (press Enter to continue)"))
      .allow_empty(true)
      .interact_text()?;
    Ok(())
  }
}

/// Non-interactive implementation for end-to-end runs: generated names,
/// pauses become log lines.
pub struct AutoPilot {
  prefix: String,
  counter: u32,
}

impl AutoPilot {
  pub fn new(prefix: impl Into<String>) -> Self {
    AutoPilot {
      prefix: prefix.into(),
      counter: 0,
    }
  }
}

impl Interact for AutoPilot {
  fn ask_non_empty(&mut self, prompt: &str) -> Result<String> {
    self.counter += 1;
    let value = format!("{}-{}", self.prefix, self.counter);
    info!(prompt = %prompt, value = %value, "Auto-answering prompt");
    Ok(value)
  }

  fn choose(&mut self, prompt: &str, items: &[String]) -> Result<usize> {
    info!(prompt = %prompt, choice = %items[0], "Auto-selecting first entry");
    Ok(0)
  }

  fn pause(&mut self, title: &str) -> Result<()> {
    info!(step = %title, "Running demo step");
    Ok(())
  }
}
