use std::fmt;
use std::str::FromStr;

pub const SYSTEM_PROMPT: &str = "
You are ChatGPT, a large language model trained by OpenAI.
Follow the user's instructions carefully. Respond using markdown.
";

pub const SYSTEM_PROMPT_CODE_INTERPRETER: &str = "
Do not make assumptions about which functions to run or which values to use. Always verify with the user.
Only use the functions you have been provided with.

`codesherpa` namespace:
A plugin for interactive code execution, file management, and shell command execution.
'/repl' endpoint
- Execute Python code interactively for general programming, tasks, data analysis, visualizations, and more.
- Pre-installed packages: matplotlib, seaborn, pandas, numpy, scipy, openpyxl.
'/command' endpoint
- Run terminal commands and interact with the filesystem, run scripts, and more.
- Embed media files created or uploaded using 'http://localhost:3333/static/images/' URL in responses.
- Users can upload files with the /upload command.
- When a user uploads a dataset (.csv, .xlsx, etc.), immediately do basic data analysis and visualization and embed the results in the response. Always give a visual representation of the data in the initial response.
- Access user-uploaded files in 'static/uploads/' directory using 'http://localhost:3333/static/uploads/' URL.
File management
- Embed images and other media files in responses using 'http://localhost:3333/static/images/' URL.
- Access user-uploaded files in 'static/uploads/'
";

/// Models the chat backend accepts. The label is what goes over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Model {
    Gpt4,
    Gpt4_0613,
    Gpt4CodeInterpreter,
    Gpt35Turbo0613,
    Gpt35Turbo16k0613,
    #[default]
    Gpt35CodeInterpreter16k,
}

impl Model {
    pub const ALL: [Model; 6] = [
        Model::Gpt4,
        Model::Gpt4_0613,
        Model::Gpt4CodeInterpreter,
        Model::Gpt35Turbo0613,
        Model::Gpt35Turbo16k0613,
        Model::Gpt35CodeInterpreter16k,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Model::Gpt4 => "GPT-4",
            Model::Gpt4_0613 => "GPT-4-0613",
            Model::Gpt4CodeInterpreter => "GPT-4 Code Interpreter",
            Model::Gpt35Turbo0613 => "GPT-3.5-Turbo-0613",
            Model::Gpt35Turbo16k0613 => "GPT-3.5-turbo-16k-0613",
            Model::Gpt35CodeInterpreter16k => "GPT-3.5 Code Interpreter",
        }
    }

    /// Upstream model the backend resolves the label to.
    pub fn api_name(self) -> &'static str {
        match self {
            Model::Gpt4 => "gpt-4",
            Model::Gpt4_0613 | Model::Gpt4CodeInterpreter => "gpt-4-0613",
            Model::Gpt35Turbo0613 => "gpt-3.5-turbo-0613",
            Model::Gpt35Turbo16k0613 | Model::Gpt35CodeInterpreter16k => "gpt-3.5-turbo-16k-0613",
        }
    }

    pub fn is_code_interpreter(self) -> bool {
        matches!(
            self,
            Model::Gpt4CodeInterpreter | Model::Gpt35CodeInterpreter16k
        )
    }

    pub fn system_prompt(self) -> &'static str {
        if self.is_code_interpreter() {
            SYSTEM_PROMPT_CODE_INTERPRETER
        } else {
            SYSTEM_PROMPT
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Model {
    type Err = String;

    /// Accepts a label (`GPT-4 Code Interpreter`) or an API name
    /// (`gpt-4-0613`) in any case. Labels win when both match.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        Model::ALL
            .into_iter()
            .find(|model| model.label().eq_ignore_ascii_case(wanted))
            .or_else(|| {
                Model::ALL
                    .into_iter()
                    .find(|model| model.api_name().eq_ignore_ascii_case(wanted))
            })
            .ok_or_else(|| {
                let labels: Vec<_> = Model::ALL.iter().map(|model| model.label()).collect();
                format!(
                    "Unknown model '{wanted}'. Available models: {}",
                    labels.join(", ")
                )
            })
    }
}
