use crate::core::message::{Message, Role};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Plain-text transcript of a chat, appended one message at a time.
#[derive(Debug, Default)]
pub struct Transcript {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl Transcript {
    /// Starts logging immediately when a file is given.
    pub fn new(log_file: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut transcript = Transcript::default();
        if let Some(path) = log_file {
            transcript.set_log_file(path)?;
        }
        Ok(transcript)
    }

    pub fn set_log_file(&mut self, path: PathBuf) -> Result<String, Box<dyn std::error::Error>> {
        test_file_access(&path)?;
        let message = format!("Logging enabled to: {}", path.display());
        self.file_path = Some(path);
        self.is_active = true;
        Ok(message)
    }

    pub fn toggle_logging(&mut self) -> Result<String, Box<dyn std::error::Error>> {
        let Some(path) = &self.file_path else {
            return Err("No log file specified. Use /log <filename> to enable logging first.".into());
        };
        if self.is_active {
            self.write_lines("## Logging paused")?;
            self.is_active = false;
            Ok(format!("Logging paused (file: {})", path.display()))
        } else {
            self.is_active = true;
            Ok(format!("Logging resumed to: {}", path.display()))
        }
    }

    /// Appends `message` in its display form. System prompts are not logged.
    pub fn record(&self, message: &Message) -> Result<(), Box<dyn std::error::Error>> {
        if !self.is_active {
            return Ok(());
        }
        let text = match message.role {
            Role::System => return Ok(()),
            Role::User => format!("You: {}", message.content),
            Role::Assistant if message.is_function_call() => {
                format!("## function_call {}", message.content)
            }
            Role::Assistant => message.content.clone(),
            Role::Function => format!(
                "## {} returned:\n{}",
                message.name.as_deref().unwrap_or("function"),
                message.content
            ),
        };
        if text.is_empty() {
            return Ok(());
        }
        self.write_lines(&text)
    }

    fn write_lines(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = &self.file_path else {
            return Ok(());
        };
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between messages.
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

fn test_file_access(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.flush()?;
    Ok(())
}
