pub mod ping;
pub mod status;

/// Text commands the bot answers in guild channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCommand {
    Ping,
    Status,
}

impl TextCommand {
    pub fn parse(content: &str) -> Option<Self> {
        let content = content.trim_start();
        if content.starts_with(ping::TRIGGER) {
            Some(TextCommand::Ping)
        } else if content.starts_with(status::TRIGGER) {
            Some(TextCommand::Status)
        } else {
            None
        }
    }
}
