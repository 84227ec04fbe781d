//! Message tokenizer: turns raw text into a command invocation.
//!
//! ```text
//! /cmd --name=John Doe -x arg1
//!  ^^^ command name (prefix stripped, lower-cased)
//!      ^^^^^^^^^^^^^^^ flag "name" = "John Doe" (value runs until the next '-' token)
//!                      ^^ flag "-x" = ""
//!                         ^^^^ positional argument
//! ```

use std::collections::HashMap;

/// The parsed representation of one command message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvocationContext {
    /// Command token with the prefix stripped, lower-cased.
    pub command_name: String,
    /// Non-flag tokens in their original order.
    pub args: Vec<String>,
    /// `--key=value` flags keyed by `key`; bare `-x` flags keyed by the whole token.
    pub flags: HashMap<String, String>,
    /// Every token after the command name, joined by single spaces.
    pub text: String,
    /// The message exactly as received.
    pub raw: String,
}

impl InvocationContext {
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }

    pub fn flag(&self, key: &str) -> Option<&str> {
        self.flags.get(key).map(String::as_str)
    }

    pub fn has_flag(&self, key: &str) -> bool {
        self.flags.contains_key(key)
    }
}

/// Result of parsing a raw message. Parsing never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedMessage {
    /// Text does not start with the prefix; log it and stop.
    NotCommand,
    /// Text is exactly the prefix; prompt the user to type a command.
    PrefixOnly,
    Command(InvocationContext),
}

/// Parse `raw` against the configured command `prefix`.
pub fn parse(raw: &str, prefix: &str) -> ParsedMessage {
    if !raw.starts_with(prefix) {
        return ParsedMessage::NotCommand;
    }
    if raw.trim() == prefix {
        return ParsedMessage::PrefixOnly;
    }

    let mut tokens = raw.split_whitespace();
    let command_name = tokens
        .next()
        .and_then(|first| first.strip_prefix(prefix))
        .unwrap_or_default()
        .to_lowercase();
    let rest: Vec<&str> = tokens.collect();
    let (args, flags) = split_flags(&rest);

    ParsedMessage::Command(InvocationContext {
        command_name,
        args,
        flags,
        text: rest.join(" "),
        raw: raw.to_string(),
    })
}

/// Carve flags out of `tokens`, leaving the rest as positional arguments.
fn split_flags(tokens: &[&str]) -> (Vec<String>, HashMap<String, String>) {
    let mut args = Vec::new();
    let mut flags = HashMap::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        i += 1;

        if let Some((key, value)) = token.strip_prefix("--").and_then(|t| t.split_once('=')) {
            let mut value = value.to_string();
            while let Some(next) = tokens.get(i).filter(|t| !t.starts_with('-')) {
                value.push(' ');
                value.push_str(next);
                i += 1;
            }
            flags.insert(key.to_string(), value);
        } else if token.starts_with('-') {
            flags.insert(token.to_string(), String::new());
        } else {
            args.push(token.to_string());
        }
    }

    (args, flags)
}
