//! Line-based stand-in for a chat client: prints renders with numbered
//! buttons and turns typed lines back into actions.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use dialog::{ClubStore, Dialogs, Outcome, Transport};
use shared::{
    domain::{ChatType, SessionId, UserId},
    error::DialogError,
    protocol::{Action, InboundAction, Render},
};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing::debug;

/// Delivers messages by printing them.
pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn send_text(&self, recipient: UserId, text: &str) -> Result<()> {
        println!("  -> [to {recipient}] {text}");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Act(Action),
    Menu,
    SwitchActor(UserId),
    Quit,
    Invalid(String),
}

/// `buttons` are the actions of the last render, in display order.
pub fn parse_line(line: &str, buttons: &[Action]) -> Command {
    let line = line.trim();
    match line {
        "quit" | "exit" => return Command::Quit,
        "menu" => return Command::Menu,
        _ => {}
    }
    if let Some(id) = line.strip_prefix("as ") {
        return match id.trim().parse::<i64>() {
            Ok(id) => Command::SwitchActor(UserId(id)),
            Err(_) => Command::Invalid(format!("not a user id: {id}")),
        };
    }
    if let Some(raw) = line.strip_prefix("date ") {
        return match raw.trim().parse::<NaiveDate>() {
            Ok(date) => Command::Act(Action::PickDate { date }),
            Err(_) => Command::Invalid(format!("expected YYYY-MM-DD, got {raw}")),
        };
    }
    if let Some(index) = line.strip_prefix('#') {
        return match index.parse::<usize>().ok().and_then(|i| i.checked_sub(1)) {
            Some(i) if i < buttons.len() => Command::Act(buttons[i].clone()),
            _ => Command::Invalid(format!("no button {line}")),
        };
    }
    Command::Act(Action::text(line))
}

pub fn format_render(render: &Render) -> String {
    let mut out = render.text.clone();
    let mut index = 0;
    for row in &render.keyboard {
        out.push('\n');
        let labels: Vec<String> = row
            .iter()
            .map(|button| {
                index += 1;
                format!("[#{index} {}]", button.label)
            })
            .collect();
        out.push_str(&labels.join(" "));
    }
    out
}

pub struct Console<P, T> {
    dialogs: Dialogs<P, T>,
    actor: UserId,
    actor_name: Option<String>,
    chat_type: ChatType,
    session: Option<SessionId>,
    buttons: Vec<Action>,
}

impl<P: ClubStore, T: Transport> Console<P, T> {
    pub fn new(
        dialogs: Dialogs<P, T>,
        actor: UserId,
        actor_name: Option<String>,
        chat_type: ChatType,
    ) -> Self {
        Self {
            dialogs,
            actor,
            actor_name,
            chat_type,
            session: None,
            buttons: Vec::new(),
        }
    }

    pub async fn run(mut self) -> Result<()> {
        self.show(&self.dialogs.main_menu(self.actor));
        let mut lines = BufReader::new(io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line, &self.buttons) {
                Command::Quit => break,
                Command::Menu => {
                    self.session = None;
                    self.show(&self.dialogs.main_menu(self.actor));
                }
                Command::SwitchActor(actor) => {
                    self.actor = actor;
                    self.actor_name = None;
                    println!("now acting as user {actor}");
                }
                Command::Invalid(reason) => println!("! {reason}"),
                Command::Act(action) => self.act(action).await,
            }
        }
        Ok(())
    }

    async fn act(&mut self, action: Action) {
        let inbound = InboundAction {
            session_id: self.session,
            actor: self.actor,
            actor_name: self.actor_name.clone(),
            chat_type: self.chat_type,
            action,
        };
        match self.dialogs.handle(inbound).await {
            Ok(Outcome::Render { session_id, render }) => {
                self.session = Some(session_id);
                self.show(&render);
            }
            Ok(Outcome::Menu(render)) => {
                self.session = None;
                self.show(&render);
            }
            Ok(Outcome::Finished { notice }) => {
                println!("{notice}");
                self.session = None;
                self.show(&self.dialogs.main_menu(self.actor));
            }
            Ok(Outcome::Closed) => {
                self.session = None;
                self.show(&self.dialogs.main_menu(self.actor));
            }
            Ok(Outcome::Ignored) => debug!(actor = %self.actor, "action ignored"),
            Err(err @ DialogError::NotFound(_)) => {
                println!("! {err}");
                self.session = None;
                self.show(&self.dialogs.main_menu(self.actor));
            }
            Err(err) => println!("! {err}"),
        }
    }

    fn show(&mut self, render: &Render) {
        self.buttons = render.buttons().map(|button| button.action.clone()).collect();
        println!("{}\n", format_render(render));
    }
}
