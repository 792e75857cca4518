use crate::core::config::data::Config;

impl Config {
    /// Effective settings, marking which ones come from defaults.
    pub fn describe(&self) -> Vec<String> {
        fn line(name: &str, value: String, is_set: bool) -> String {
            if is_set {
                format!("  {name}: {value}")
            } else {
                format!("  {name}: {value} (default)")
            }
        }

        vec![
            line("chat-url", self.chat_url().to_string(), self.chat_url.is_some()),
            line(
                "default-model",
                self.default_model().to_string(),
                self.default_model.is_some(),
            ),
            line(
                "plugin-document",
                self.plugin_document().to_string(),
                self.plugin_document.is_some(),
            ),
            line(
                "upload-url",
                self.upload_url().to_string(),
                self.upload_url.is_some(),
            ),
            line(
                "max-function-calls",
                self.max_function_calls().to_string(),
                self.max_function_calls.is_some(),
            ),
            match self.request_timeout_secs {
                Some(secs) => format!("  request-timeout-secs: {secs}"),
                None => "  request-timeout-secs: (unset)".to_string(),
            },
        ]
    }

    pub fn print_all(&self) {
        println!("Current configuration:");
        for line in self.describe() {
            println!("{line}");
        }
    }
}
