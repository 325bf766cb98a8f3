//! Line-oriented terminal front end: guided authentication, then a command
//! loop issuing synchronizer commands and rendering store snapshots.

use std::io;

use anyhow::Result;
use chrono::DateTime;

use crate::{
    backend::contracts::{AuthGateway, DataBackend},
    domain::notification::Notification,
    session::{ClientSession, SendError},
    store::ChatState,
    usecases::{inbox::Notifier, send_message::SendMessageError},
};

pub trait Console {
    fn print_line(&mut self, line: &str) -> io::Result<()>;
    fn prompt_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
    fn prompt_secret(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

pub struct StdConsole;

impl Console for StdConsole {
    fn print_line(&mut self, line: &str) -> io::Result<()> {
        println!("{line}");
        Ok(())
    }

    fn prompt_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        use std::io::Write;

        print!("{prompt}");
        io::stdout().flush()?;

        let mut line = String::new();
        let bytes = io::stdin().read_line(&mut line)?;
        if bytes == 0 {
            return Ok(None);
        }

        Ok(Some(line.trim().to_owned()))
    }

    fn prompt_secret(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match rpassword::prompt_password(prompt) {
            Ok(password) => Ok(Some(password.trim().to_owned())),
            Err(source) if source.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(source) => Err(source),
        }
    }
}

/// Prints arriving notifications straight to stdout; the shell re-renders
/// on the next prompt anyway.
#[derive(Debug, Clone, Default)]
pub struct PrintNotifier;

impl Notifier for PrintNotifier {
    fn notify(&self, notification: &Notification) {
        println!("* {}: {}", notification.headline(), notification.text);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Help,
    Quit,
    Users,
    Chats,
    Open(String),
    Close,
    Pin(String),
    Remove(String),
    SignOut,
    Send(String),
}

/// Parses one input line. Slash-prefixed lines are commands; anything else
/// is message text for the open conversation.
pub fn parse_command(line: &str) -> Option<ShellCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(ShellCommand::Send(line.to_owned()));
    }

    let mut parts = line.splitn(2, char::is_whitespace);
    let keyword = parts.next().unwrap_or_default();
    let argument = parts.next().map(str::trim).unwrap_or_default();

    match (keyword, argument) {
        ("/help", _) => Some(ShellCommand::Help),
        ("/quit", _) => Some(ShellCommand::Quit),
        ("/users", _) => Some(ShellCommand::Users),
        ("/chats", _) => Some(ShellCommand::Chats),
        ("/close", _) => Some(ShellCommand::Close),
        ("/logout", _) => Some(ShellCommand::SignOut),
        ("/open", target) if !target.is_empty() => Some(ShellCommand::Open(target.to_owned())),
        ("/pin", target) if !target.is_empty() => Some(ShellCommand::Pin(target.to_owned())),
        ("/rm", target) if !target.is_empty() => Some(ShellCommand::Remove(target.to_owned())),
        _ => None,
    }
}

/// Resolves a user-typed target against the roster: a 1-based index from
/// the `/users` listing, an exact id, or an exact (case-insensitive) name.
pub fn resolve_partner(state: &ChatState, target: &str) -> Option<String> {
    if let Ok(index) = target.parse::<usize>() {
        if index >= 1 {
            return state
                .roster
                .entries()
                .get(index - 1)
                .map(|entry| entry.id.clone());
        }
    }

    state
        .roster
        .entries()
        .iter()
        .find(|entry| entry.id == target || entry.name.eq_ignore_ascii_case(target))
        .map(|entry| entry.id.clone())
}

pub fn roster_lines(state: &ChatState) -> Vec<String> {
    state
        .roster
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let presence = if entry.is_online { "online" } else { "offline" };
            format!("{:>2}. {} <{}> [{}]", index + 1, entry.name, entry.email, presence)
        })
        .collect()
}

pub fn chat_lines(state: &ChatState) -> Vec<String> {
    state
        .chat_set
        .active()
        .iter()
        .map(|chat_id| {
            let name = state
                .roster
                .find(chat_id)
                .map(|entry| entry.name.as_str())
                .unwrap_or(chat_id.as_str());
            let pin = if state.chat_set.is_pinned(chat_id) {
                "* "
            } else {
                "  "
            };
            let unread = state.unread.count(chat_id);
            if unread > 0 {
                format!("{pin}{name} ({unread} unread)")
            } else {
                format!("{pin}{name}")
            }
        })
        .collect()
}

pub fn message_lines(state: &ChatState) -> Vec<String> {
    let self_id = state.current_user_id().unwrap_or_default().to_owned();
    state
        .conversation
        .messages()
        .iter()
        .map(|message| {
            let author = if message.is_from(&self_id) {
                "me"
            } else {
                state
                    .roster
                    .find(&message.sender_id)
                    .map(|entry| entry.name.as_str())
                    .unwrap_or(message.sender_id.as_str())
            };
            format!(
                "[{}] {author}: {}",
                format_clock(message.sent_at_unix_ms),
                message.text
            )
        })
        .collect()
}

fn format_clock(unix_ms: i64) -> String {
    DateTime::from_timestamp_millis(unix_ms)
        .map(|at| at.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_owned())
}

const HELP_LINES: [&str; 8] = [
    "/users          list everyone else and their presence",
    "/chats          list active chats (* = pinned)",
    "/open <who>     open a conversation (index, id, or name)",
    "/close          close the open conversation",
    "/pin <who>      pin or unpin a chat",
    "/rm <who>       remove a chat",
    "/logout         sign out",
    "/quit           sign out and exit",
];

pub fn start<B, A, N>(
    console: &mut dyn Console,
    session: &mut ClientSession<B, A, N>,
) -> Result<()>
where
    B: DataBackend,
    A: AuthGateway,
    N: Notifier,
{
    session.start();
    session.pump();

    loop {
        if session.store().snapshot().session.user.is_none() {
            if !run_auth_flow(console, session)? {
                return Ok(());
            }
        }

        if !run_command_loop(console, session)? {
            return Ok(());
        }
    }
}

/// Guided authentication: `login`, `signup`, `google`, or `quit`. Mirrors
/// the sign-in tabs of the web client, one fixed error line per attempt.
fn run_auth_flow<B, A, N>(
    console: &mut dyn Console,
    session: &mut ClientSession<B, A, N>,
) -> Result<bool>
where
    B: DataBackend,
    A: AuthGateway,
    N: Notifier,
{
    console.print_line("Sign in to start chatting.")?;

    loop {
        let Some(choice) = console.prompt_line("login | signup | google | quit: ")? else {
            return Ok(false);
        };

        match choice.as_str() {
            "quit" => return Ok(false),
            "login" | "signup" => {
                let Some(email) = console.prompt_line("email: ")? else {
                    return Ok(false);
                };
                let Some(password) = console.prompt_secret("password: ")? else {
                    return Ok(false);
                };
                if choice == "login" {
                    session.sign_in(&email, &password);
                } else {
                    session.sign_up(&email, &password);
                }
            }
            "google" => session.sign_in_federated(),
            _ => continue,
        }

        session.pump();
        let snapshot = session.store().snapshot();
        if let Some(user) = snapshot.session.user.as_ref() {
            console.print_line(&format!("Signed in as {}.", user.name))?;
            return Ok(true);
        }
        if let Some(error) = snapshot.session.error.as_deref() {
            console.print_line(error)?;
        }
    }
}

/// Returns `false` to exit the program, `true` to fall back to the auth
/// flow (after a sign-out).
fn run_command_loop<B, A, N>(
    console: &mut dyn Console,
    session: &mut ClientSession<B, A, N>,
) -> Result<bool>
where
    B: DataBackend,
    A: AuthGateway,
    N: Notifier,
{
    loop {
        session.pump();
        let Some(line) = console.prompt_line("> ")? else {
            session.sign_out();
            session.pump();
            return Ok(false);
        };

        let Some(command) = parse_command(&line) else {
            continue;
        };

        match command {
            ShellCommand::Help => {
                for line in HELP_LINES {
                    console.print_line(line)?;
                }
            }
            ShellCommand::Quit => {
                session.sign_out();
                session.pump();
                return Ok(false);
            }
            ShellCommand::SignOut => {
                session.sign_out();
                session.pump();
                return Ok(true);
            }
            ShellCommand::Users => {
                for line in roster_lines(&session.store().snapshot()) {
                    console.print_line(&line)?;
                }
            }
            ShellCommand::Chats => {
                let lines = chat_lines(&session.store().snapshot());
                if lines.is_empty() {
                    console.print_line("No active chats. Use /open <who> to start one.")?;
                }
                for line in lines {
                    console.print_line(&line)?;
                }
            }
            ShellCommand::Open(target) => {
                let snapshot = session.store().snapshot();
                match resolve_partner(&snapshot, &target) {
                    Some(partner_id) => {
                        session.add_active_chat(&partner_id);
                        session.select_chat(Some(&partner_id));
                        session.pump();
                        for line in message_lines(&session.store().snapshot()) {
                            console.print_line(&line)?;
                        }
                    }
                    None => console.print_line(&format!("No user matches '{target}'."))?,
                }
            }
            ShellCommand::Close => {
                session.select_chat(None);
            }
            ShellCommand::Pin(target) => {
                let snapshot = session.store().snapshot();
                match resolve_partner(&snapshot, &target) {
                    Some(partner_id) => session.toggle_pinned_chat(&partner_id),
                    None => console.print_line(&format!("No user matches '{target}'."))?,
                }
            }
            ShellCommand::Remove(target) => {
                let snapshot = session.store().snapshot();
                match resolve_partner(&snapshot, &target) {
                    Some(partner_id) => session.remove_chat(&partner_id),
                    None => console.print_line(&format!("No user matches '{target}'."))?,
                }
            }
            ShellCommand::Send(text) => match session.send(&text) {
                Ok(()) => {
                    session.pump();
                    if let Some(line) = message_lines(&session.store().snapshot()).last() {
                        console.print_line(line)?;
                    }
                }
                Err(SendError::NoChatSelected) => {
                    console.print_line("Open a conversation first: /open <who>.")?;
                }
                Err(SendError::NotSignedIn) => {
                    console.print_line("Not signed in.")?;
                }
                Err(SendError::Message(SendMessageError::EmptyMessage)) => {
                    console.print_line("Cannot send an empty message.")?;
                }
                Err(SendError::Message(SendMessageError::TemporarilyUnavailable)) => {
                    console.print_line("Sending failed. Please try again.")?;
                }
            },
        }
    }
}
