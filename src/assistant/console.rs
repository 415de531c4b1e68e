//! Terminal front end shared by document chat and the library agent.
//!
//! Plain lines are questions; lines starting with `/` are commands standing in for the
//! sidebar controls (project selector, upload, reset).

use async_trait::async_trait;
use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::agent::Agent;
use crate::client_wrapper::Role;
use crate::document_chat::DocumentChat;
use crate::drive::DriveApi;
use crate::session::ChatSession;

pub const HELP: &str = "\
Commands:
  /project <name|number>  switch the active project
  /projects               list configured projects
  /upload <path>          load a local PDF (library mode: publish it to the library)
  /docs                   show loaded documents
  /reset                  clear the conversation and loaded documents
  /help                   show this help
  /quit                   exit
Anything else is sent as a question.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Ask(String),
    Project(String),
    Projects,
    Upload(PathBuf),
    Documents,
    Reset,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ChatCommand::Empty;
        }
        let rest = match line.strip_prefix('/') {
            Some(rest) => rest,
            None => return ChatCommand::Ask(line.to_string()),
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match (name.to_lowercase().as_str(), arg.is_empty()) {
            ("project", false) => ChatCommand::Project(arg.to_string()),
            ("project", true) | ("projects", _) => ChatCommand::Projects,
            ("upload", false) => ChatCommand::Upload(PathBuf::from(unquote(arg))),
            ("docs", _) | ("documents", _) => ChatCommand::Documents,
            ("reset", _) | ("clear", _) => ChatCommand::Reset,
            ("help", _) | ("?", _) => ChatCommand::Help,
            ("quit", _) | ("exit", _) | ("q", _) => ChatCommand::Quit,
            _ => ChatCommand::Unknown(line.to_string()),
        }
    }
}

fn unquote(arg: &str) -> &str {
    arg.strip_prefix('"')
        .and_then(|a| a.strip_suffix('"'))
        .unwrap_or(arg)
}

/// What the console needs from either front end.
#[async_trait]
pub trait ChatFrontend: Send + Sync {
    fn title(&self) -> &str;
    fn model_name(&self) -> &str;
    fn session(&self) -> &ChatSession;
    fn set_project(&mut self, project: &str);
    async fn ask(&mut self, question: &str) -> Result<String, Box<dyn Error + Send + Sync>>;
    /// Handle `/upload`; returns the confirmation line.
    async fn upload(&mut self, path: &Path) -> Result<String, Box<dyn Error + Send + Sync>>;
    async fn documents(&self) -> Vec<String>;
    async fn status(&self) -> String;
    async fn reset(&mut self);
}

#[async_trait]
impl ChatFrontend for DocumentChat {
    fn title(&self) -> &str {
        "Piping Assistant"
    }

    fn model_name(&self) -> &str {
        DocumentChat::model_name(self)
    }

    fn session(&self) -> &ChatSession {
        DocumentChat::session(self)
    }

    fn set_project(&mut self, project: &str) {
        DocumentChat::set_project(self, project);
    }

    async fn ask(&mut self, question: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        Ok(DocumentChat::ask(self, question).await?)
    }

    async fn upload(&mut self, path: &Path) -> Result<String, Box<dyn Error + Send + Sync>> {
        let pages = self.load_pdf_file(path)?;
        Ok(format!("Document loaded! ({} pages)", pages))
    }

    async fn documents(&self) -> Vec<String> {
        DocumentChat::session(self)
            .document()
            .map(|d| vec![format!("{} ({} pages)", d.name, d.page_count)])
            .unwrap_or_default()
    }

    async fn status(&self) -> String {
        let session = DocumentChat::session(self);
        match session.document() {
            Some(_) => format!("Active memory: document loaded for {}", session.project()),
            None => "No document loaded. Answering from general knowledge.".to_string(),
        }
    }

    async fn reset(&mut self) {
        DocumentChat::reset(self).await;
    }
}

/// The agent plus the library it can publish uploads to.
pub struct LibraryAgent {
    agent: Agent,
    drive: Arc<dyn DriveApi>,
}

impl LibraryAgent {
    pub fn new(agent: Agent, drive: Arc<dyn DriveApi>) -> Self {
        Self { agent, drive }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

#[async_trait]
impl ChatFrontend for LibraryAgent {
    fn title(&self) -> &str {
        "Piping Assistant - document library"
    }

    fn model_name(&self) -> &str {
        self.agent.model_name()
    }

    fn session(&self) -> &ChatSession {
        self.agent.session()
    }

    fn set_project(&mut self, project: &str) {
        self.agent.set_project(project);
    }

    async fn ask(&mut self, question: &str) -> Result<String, Box<dyn Error + Send + Sync>> {
        let response = self.agent.send(question).await?;
        if let Some(usage) = &response.tokens_used {
            log::debug!(
                "turn used {} tokens over {} tool calls",
                usage.total_tokens,
                response.tool_calls_made
            );
        }
        Ok(response.content)
    }

    async fn upload(&mut self, path: &Path) -> Result<String, Box<dyn Error + Send + Sync>> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or("upload path has no file name")?;
        let file = self.drive.upload_pdf(&name, bytes).await?;
        Ok(format!("Uploaded '{}' to the library.", file.name))
    }

    async fn documents(&self) -> Vec<String> {
        self.agent.session().loaded_documents().names().await
    }

    async fn status(&self) -> String {
        let session = self.agent.session();
        let count = session.loaded_documents().names().await.len();
        format!(
            "Library mode for {}: {} document(s) read in this conversation",
            session.project(),
            count
        )
    }

    async fn reset(&mut self) {
        self.agent.reset().await;
    }
}

/// Line-oriented console over any reader and writer.
pub struct Console<R, W> {
    input: R,
    output: W,
    projects: Vec<String>,
    show_progress: bool,
}

impl Console<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio(projects: Vec<String>) -> Self {
        Console::new(io::stdin().lock(), io::stdout(), projects).with_progress(true)
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W, projects: Vec<String>) -> Self {
        Self {
            input,
            output,
            projects,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Load a PDF into the front end, reporting failure inline.
    ///
    /// A bad file leaves the session without a document; only output errors
    /// are returned.
    pub async fn preload(&mut self, frontend: &mut dyn ChatFrontend, path: &Path) -> io::Result<()> {
        let result = self.with_progress_dots(frontend.upload(path)).await;
        match result {
            Ok(confirmation) => writeln!(self.output, "{}", confirmation),
            Err(err) => {
                log::warn!("upload of {} failed: {}", path.display(), err);
                writeln!(self.output, "Error reading {}: {}", path.display(), err)
            }
        }
    }

    /// Read commands until `/quit` or end of input.
    pub async fn run(&mut self, frontend: &mut dyn ChatFrontend) -> io::Result<()> {
        writeln!(
            self.output,
            "{}",
            banner(frontend.title(), frontend.model_name(), frontend.session().project())
        )?;
        writeln!(self.output, "{}", frontend.status().await)?;

        loop {
            write!(self.output, "\nYou: ")?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                break;
            }

            match ChatCommand::parse(&line) {
                ChatCommand::Empty => continue,
                ChatCommand::Quit => break,
                ChatCommand::Help => writeln!(self.output, "{}", HELP)?,
                ChatCommand::Projects => {
                    let active = frontend.session().project().to_string();
                    for (i, project) in self.projects.iter().enumerate() {
                        let marker = if *project == active { "*" } else { " " };
                        writeln!(self.output, "{} {}. {}", marker, i + 1, project)?;
                    }
                }
                ChatCommand::Project(choice) => match resolve_project(&self.projects, &choice) {
                    Some(project) => {
                        frontend.set_project(&project);
                        writeln!(self.output, "Context: {}", project)?;
                    }
                    None => writeln!(
                        self.output,
                        "Unknown project '{}'. Use /projects to list them.",
                        choice
                    )?,
                },
                ChatCommand::Upload(path) => {
                    self.preload(frontend, &path).await?;
                    writeln!(self.output, "{}", frontend.status().await)?;
                }
                ChatCommand::Documents => {
                    let docs = frontend.documents().await;
                    if docs.is_empty() {
                        writeln!(self.output, "No documents loaded.")?;
                    }
                    for doc in docs {
                        writeln!(self.output, "- {}", doc)?;
                    }
                }
                ChatCommand::Reset => {
                    frontend.reset().await;
                    writeln!(self.output, "Memory cleared.")?;
                    writeln!(self.output, "{}", frontend.status().await)?;
                }
                ChatCommand::Unknown(command) => writeln!(
                    self.output,
                    "Unknown command '{}'. Type /help for the list.",
                    command
                )?,
                ChatCommand::Ask(question) => {
                    let result = self.with_progress_dots(frontend.ask(&question)).await;
                    match result {
                        Ok(answer) => writeln!(self.output, "\nAssistant:\n{}", answer)?,
                        Err(err) => {
                            log::error!("question failed: {}", err);
                            writeln!(self.output, "Error: {}", err)?
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn with_progress_dots<F, T>(&self, work: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        if !self.show_progress {
            return work.await;
        }
        let dots = WaitingDots::start(3);
        let result = work.await;
        dots.stop().await;
        result
    }
}

/// Match a project by 1-based number or case-insensitive name.
pub fn resolve_project(projects: &[String], choice: &str) -> Option<String> {
    if let Ok(n) = choice.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| projects.get(i)).cloned();
    }
    projects
        .iter()
        .find(|p| p.eq_ignore_ascii_case(choice))
        .cloned()
}

pub fn banner(title: &str, model: &str, project: &str) -> String {
    format!(
        "{title}\nModel: {model} | Context: {project}\nType /help for commands.",
        title = title,
        model = model,
        project = project
    )
}

/// Render the conversation the way the console prints it.
pub fn render_transcript(session: &ChatSession) -> String {
    let mut out = String::new();
    for turn in session.history().turns() {
        let speaker = match turn.role {
            Role::User => "You",
            _ => "Assistant",
        };
        out.push_str(&format!("{}:\n{}\n\n", speaker, turn.text));
    }
    out
}

/// Dots printed to stdout while a request is in flight.
pub struct WaitingDots {
    tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl WaitingDots {
    pub fn start(num_dots: usize) -> Self {
        let (tx, rx) = watch::channel(true);
        let handle = tokio::spawn(display_waiting_dots(rx, num_dots));
        Self { tx, handle }
    }

    pub async fn stop(self) {
        let _ = self.tx.send(false);
        let _ = self.handle.await;
    }
}

async fn display_waiting_dots(rx: watch::Receiver<bool>, num_dots: usize) {
    let mut stdout = io::stdout();
    while *rx.borrow() {
        for _ in 0..num_dots {
            if !*rx.borrow() {
                break;
            }
            let _ = write!(stdout, ".");
            let _ = stdout.flush();
            sleep(Duration::from_millis(500)).await;
        }
        let _ = write!(stdout, "\r{}\r", " ".repeat(num_dots));
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(
            ChatCommand::parse("  What is the flange rating?  "),
            ChatCommand::Ask("What is the flange rating?".into())
        );
        assert_eq!(ChatCommand::parse("   \n"), ChatCommand::Empty);
    }

    #[test]
    fn slash_commands_map_to_variants() {
        assert_eq!(
            ChatCommand::parse("/project Gas Pipeline"),
            ChatCommand::Project("Gas Pipeline".into())
        );
        assert_eq!(ChatCommand::parse("/project"), ChatCommand::Projects);
        assert_eq!(ChatCommand::parse("/projects"), ChatCommand::Projects);
        assert_eq!(
            ChatCommand::parse("/upload \"specs/PS 001.pdf\""),
            ChatCommand::Upload(PathBuf::from("specs/PS 001.pdf"))
        );
        assert_eq!(ChatCommand::parse("/docs"), ChatCommand::Documents);
        assert_eq!(ChatCommand::parse("/RESET"), ChatCommand::Reset);
        assert_eq!(ChatCommand::parse("/help"), ChatCommand::Help);
        assert_eq!(ChatCommand::parse("/quit"), ChatCommand::Quit);
        assert_eq!(
            ChatCommand::parse("/upload"),
            ChatCommand::Unknown("/upload".into())
        );
        assert_eq!(
            ChatCommand::parse("/frobnicate now"),
            ChatCommand::Unknown("/frobnicate now".into())
        );
    }

    #[test]
    fn projects_resolve_by_number_or_name() {
        let projects: Vec<String> = ["General", "Brazi Refinery", "Gas Pipeline"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(resolve_project(&projects, "2").as_deref(), Some("Brazi Refinery"));
        assert_eq!(resolve_project(&projects, "gas pipeline").as_deref(), Some("Gas Pipeline"));
        assert_eq!(resolve_project(&projects, "0"), None);
        assert_eq!(resolve_project(&projects, "4"), None);
        assert_eq!(resolve_project(&projects, "Offshore"), None);
    }

    #[test]
    fn transcript_labels_speakers() {
        let mut session = ChatSession::new("General");
        session.history_mut().push_user("DN?");
        session.history_mut().push_assistant("DN50.");
        assert_eq!(render_transcript(&session), "You:\nDN?\n\nAssistant:\nDN50.\n\n");
    }
}
