use linkly_client::{
    health::HealthMonitor,
    links::{LinkSynchronizer, ANONYMOUS_HINT},
    models::{ActiveTab, DurationUnit, LinkForm, LinkRecord},
    notify::{Level, RecordingSink},
    session::SessionManager,
    DeleteOutcome,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

const HELP: &str = "\
Commands:
  login <username> <password>
  register <username> <email> <password>
  logout
  shorten <url> [--alias <code>] [--expire <n> hours|days]
  list                      show the active tab
  tab my|popular            switch tabs
  refresh <short-code>      re-read one link's hits
  delete <id>               delete one of your links
  reload                    re-fetch every list
  health                    probe the server now
  status                    who am I, is the server up
  help
  quit";

// ── Commands ───────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Login { username: String, password: String },
    Register { username: String, email: String, password: String },
    Logout,
    Shorten(LinkForm),
    List,
    Tab(ActiveTab),
    Refresh(String),
    Delete(i64),
    Reload,
    Health,
    Status,
    Help,
    Quit,
}

fn parse(line: &str) -> Result<Command, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&name, args)) = words.split_first() else {
        return Err("Type `help` for a list of commands.".into());
    };

    let command = match (name, args) {
        ("login", [username, password]) => Command::Login {
            username: (*username).into(),
            password: (*password).into(),
        },
        ("register", [username, email, password]) => Command::Register {
            username: (*username).into(),
            email: (*email).into(),
            password: (*password).into(),
        },
        ("logout", []) => Command::Logout,
        ("shorten", [url, rest @ ..]) => Command::Shorten(parse_shorten(url, rest)?),
        ("list", []) => Command::List,
        ("tab", ["my"]) => Command::Tab(ActiveTab::My),
        ("tab", ["popular"]) => Command::Tab(ActiveTab::Popular),
        ("refresh", [code]) => Command::Refresh((*code).into()),
        ("delete", [id]) => Command::Delete(
            id.parse()
                .map_err(|_| format!("Link id must be a number, got {id:?}"))?,
        ),
        ("reload", []) => Command::Reload,
        ("health", []) => Command::Health,
        ("status", []) => Command::Status,
        ("help", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        _ => return Err(format!("Can't make sense of {line:?}. Try `help`.")),
    };
    Ok(command)
}

fn parse_shorten(url: &str, mut rest: &[&str]) -> Result<LinkForm, String> {
    let mut form = LinkForm::new(url);
    loop {
        rest = match rest {
            [] => return Ok(form),
            ["--alias", code, tail @ ..] => {
                form.custom_short_code = (*code).into();
                tail
            }
            ["--expire", value, unit, tail @ ..] => {
                form.duration_unit = DurationUnit::parse(unit)
                    .ok_or_else(|| format!("Unit must be hours or days, got {unit:?}"))?;
                form.duration_value = (*value).into();
                tail
            }
            [other, ..] => return Err(format!("Unknown shorten option {other:?}")),
        };
    }
}

/// Commands that only make sense for a signed-in user, with the text shown
/// when nobody is.
fn requires_login(command: &Command) -> Option<&'static str> {
    match command {
        Command::Delete(_) => Some("Login to manage your links."),
        _ => None,
    }
}

// ── Console loop ───────────────────────────────────────────────────────────

/// Terminal front end: reads commands from stdin and renders the session,
/// the active link list and the toasts emitted along the way.
pub struct Console {
    session: Arc<SessionManager>,
    sync: Arc<LinkSynchronizer>,
    health: Arc<HealthMonitor>,
    toasts: RecordingSink,
}

impl Console {
    pub fn new(
        session: Arc<SessionManager>,
        sync: Arc<LinkSynchronizer>,
        health: Arc<HealthMonitor>,
        toasts: RecordingSink,
    ) -> Self {
        Self {
            session,
            sync,
            health,
            toasts,
        }
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("{HELP}");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match parse(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => self.execute(command, &mut lines).await?,
                Err(msg) => println!("{msg}"),
            }
            self.flush_toasts();
        }

        Ok(())
    }

    async fn execute(
        &self,
        command: Command,
        lines: &mut Lines<BufReader<Stdin>>,
    ) -> anyhow::Result<()> {
        if let Some(hint) = requires_login(&command) {
            if !self.session.is_authenticated() {
                println!("{hint}");
                return Ok(());
            }
        }

        // Failures have already been reported as toasts.
        match command {
            Command::Login { username, password } => {
                let _ = self.session.login(&username, &password).await;
            }
            Command::Register {
                username,
                email,
                password,
            } => {
                let _ = self.session.register(&username, &email, &password).await;
            }
            Command::Logout => self.session.logout(),
            Command::Shorten(mut form) => {
                if let Ok(link) = self.sync.create(&mut form).await {
                    self.flush_toasts();
                    println!("URL Shortened! {}", link.short_url);
                    println!("  Original: {}", link.original_url);
                    if !self.session.is_authenticated() {
                        println!("  {ANONYMOUS_HINT}");
                    }
                }
            }
            Command::List => self.print_list(),
            Command::Tab(tab) => {
                if self.sync.select_tab(tab) {
                    self.print_list();
                } else {
                    println!("Login to see your own links.");
                }
            }
            Command::Refresh(code) => {
                let _ = self.sync.refresh_one(&code).await;
            }
            Command::Delete(id) => {
                println!("Are you sure you want to delete this URL? [y/N]");
                let answer = lines.next_line().await?.unwrap_or_default();
                let confirmed = matches!(answer.trim(), "y" | "Y" | "yes");
                if let Ok(DeleteOutcome::Cancelled) = self.sync.delete(id, || confirmed).await {
                    println!("Kept it.");
                }
            }
            Command::Reload => {
                self.sync.refresh_all().await;
                self.print_list();
            }
            Command::Health => match self.health.try_check().await {
                Some(_) => println!("Server: {}", self.health.status()),
                None => println!("Already checking..."),
            },
            Command::Status => {
                match self.session.current() {
                    Some(identity) => {
                        println!("Signed in as {} <{}>", identity.username, identity.email)
                    }
                    None => println!("Not signed in"),
                }
                println!("Server: {}", self.health.status());
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
        Ok(())
    }

    fn print_list(&self) {
        let view = self.sync.view();
        let title = match (view.active_tab, self.session.is_authenticated()) {
            (ActiveTab::My, true) => "My URLs",
            _ => "Popular URLs",
        };
        println!("── {title} ──");

        let links = view.visible();
        if links.is_empty() {
            println!("No URLs found.");
        }
        for link in links {
            println!("{}", render(link));
        }
    }

    fn flush_toasts(&self) {
        for toast in self.toasts.drain() {
            let mark = match toast.level {
                Level::Success => "✔",
                Level::Error => "✖",
            };
            println!("{mark} {}", toast.message);
        }
    }
}

fn render(link: &LinkRecord) -> String {
    let mut line = format!(
        "#{:<5} {}  {} hits\n        {}\n        Created: {}",
        link.id,
        link.short_url,
        link.hits,
        link.original_url,
        link.created_date()
    );
    if let Some(expires) = link.expire_date() {
        line.push_str(&format!("  Expires: {expires}"));
    }
    line
}
