use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use engine_logging::engine_info;
use scholar_core::{
    ChatRole, DocumentSource, JobKind, Msg, PendingAttachment, SessionId, Variant, WorkspaceName,
};
use scholar_engine::archive_path;

use crate::cli::Command;
use crate::persistence::{load_last_workspace, save_last_workspace};
use crate::render::{document_text, sessions_text, transcript_text, workspaces_text, JobEcho};
use crate::runner::Session;

pub fn execute(command: Command, session: Session, state_dir: PathBuf) -> anyhow::Result<()> {
    let mut client = Client {
        session,
        state_dir,
        echo: JobEcho::default(),
    };
    let derive = command.derive_kind();

    match command {
        Command::Workspaces => {
            client.require(Msg::RefreshWorkspaces, "listing workspaces")?;
            print!("{}", workspaces_text(&client.session.view()));
        }
        Command::Open { workspace, variant } => {
            client.open(workspace)?;
            client.show(variant.into())?;
            print!("{}", document_text(&client.session.view()));
        }
        Command::Ingest { source } => {
            let source = document_source(&source);
            if let DocumentSource::File(path) = &source {
                if !path.is_file() {
                    bail!("{} is not a file", path.display());
                }
            }
            client.require(Msg::RefreshWorkspaces, "listing workspaces")?;
            client.require(Msg::IngestRequested(source), "ingest")?;
            let view = client.session.view();
            save_last_workspace(&client.state_dir, view.active_workspace.as_ref());
            println!();
            if let Some(workspace) = &view.active_workspace {
                println!("Created workspace {workspace}");
            }
        }
        Command::Translate { workspace }
        | Command::Explain { workspace }
        | Command::Thread { workspace } => {
            let Some(kind) = derive else {
                bail!("not a derive command");
            };
            client.open(workspace)?;
            client.require(Msg::DeriveRequested(kind), &kind.to_string())?;
            println!();
            println!("{} is ready.", kind.variant());
        }
        Command::Save {
            variant,
            file,
            workspace,
        } => {
            let content = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let variant = Variant::from(variant);
            client.open(workspace)?;
            client.show(variant)?;
            client.session.dispatch(Msg::ContentEdited(content));
            client.require(Msg::SaveRequested, "save")?;
            println!("Saved {variant}.");
        }
        Command::Sessions { workspace } => {
            client.open(workspace)?;
            print!("{}", sessions_text(&client.session.view()));
        }
        Command::Chat {
            message,
            workspace,
            session,
            attachments,
        } => {
            client.open(workspace)?;
            if let Some(session) = session {
                client.require(
                    Msg::SessionRestoreRequested(SessionId::new(session)),
                    "restoring the conversation",
                )?;
            }
            for attachment in attachments {
                client
                    .session
                    .dispatch(Msg::AttachmentAdded(PendingAttachment::new(attachment)));
            }
            client.require(Msg::ChatSubmitted(message), "chat")?;
            print!("{}", last_reply(&client));
        }
        Command::Delete {
            workspace,
            variant,
            yes,
        } => match variant {
            Some(variant) => {
                client.open(Some(workspace))?;
                client.require(Msg::DeleteVariantRequested(variant.into()), "delete")?;
                println!("Deleted {}.", Variant::from(variant));
            }
            None => {
                let name = WorkspaceName::new(workspace);
                client.require(Msg::RefreshWorkspaces, "listing workspaces")?;
                client.session.dispatch(Msg::DeleteWorkspaceRequested(name.clone()));
                if !yes && !confirm(&format!("Delete workspace {name}?"))? {
                    client.session.dispatch(Msg::DeleteWorkspaceCancelled);
                    return Ok(());
                }
                client.require(Msg::DeleteWorkspaceConfirmed, "delete")?;
                if load_last_workspace(&client.state_dir).as_ref() == Some(&name) {
                    save_last_workspace(&client.state_dir, None);
                }
                println!("Deleted {name}.");
            }
        },
        Command::Download {
            destination,
            workspace,
        } => {
            let workspace = client.open(workspace)?;
            let target = archive_path(&destination, workspace.as_str());
            client.require(Msg::DownloadRequested { destination }, "download")?;
            println!("Saved {workspace} to {}", target.display());
        }
        Command::Shell => shell(&mut client)?,
    }
    Ok(())
}

struct Client {
    session: Session,
    state_dir: PathBuf,
    echo: JobEcho,
}

impl Client {
    /// Dispatches `msg` and waits for everything it sets off. Returns the
    /// notice left behind, if any.
    fn step(&mut self, msg: Msg) -> Option<String> {
        self.session.dispatch(Msg::NoticeDismissed);
        self.session.dispatch(msg);
        let mut stdout = io::stdout();
        let _ = self.echo.observe(&self.session.view(), &mut stdout);
        let echo = &mut self.echo;
        self.session.settle(|view| {
            let _ = echo.observe(view, &mut stdout);
        });
        self.session.view().notice
    }

    fn require(&mut self, msg: Msg, what: &str) -> anyhow::Result<()> {
        match self.step(msg) {
            Some(_) => bail!("{what} did not complete"),
            None => Ok(()),
        }
    }

    /// Selects `name`, or the workspace remembered from the last run.
    fn open(&mut self, name: Option<String>) -> anyhow::Result<WorkspaceName> {
        let name = match name {
            Some(name) => WorkspaceName::new(name),
            None => load_last_workspace(&self.state_dir)
                .context("no workspace given and none remembered")?,
        };
        self.require(Msg::RefreshWorkspaces, "listing workspaces")?;
        if !self
            .session
            .view()
            .workspaces
            .iter()
            .any(|entry| entry.name == name)
        {
            bail!("unknown workspace {name}");
        }
        // Agent or session failures leave the document usable.
        self.step(Msg::WorkspaceSelected(name.clone()));
        save_last_workspace(&self.state_dir, Some(&name));
        engine_info!("Opened workspace {}", name);
        Ok(name)
    }

    fn show(&mut self, variant: Variant) -> anyhow::Result<()> {
        if self.session.view().document.variant == Some(variant) {
            return Ok(());
        }
        self.require(Msg::VariantRequested(variant), &format!("loading {variant}"))
    }
}

fn last_reply(client: &Client) -> String {
    client
        .session
        .view()
        .chat
        .messages
        .iter()
        .rev()
        .find(|message| message.role == ChatRole::Assistant)
        .map(|message| format!("{}\n", message.content))
        .unwrap_or_default()
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn document_source(source: &str) -> DocumentSource {
    if source.starts_with("http://") || source.starts_with("https://") {
        DocumentSource::Url(source.to_string())
    } else {
        DocumentSource::File(Path::new(source).to_path_buf())
    }
}

/// What the shell prints after an action settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Show {
    Nothing,
    Workspaces,
    Document,
    Sessions,
    Transcript,
    Reply,
}

#[derive(Debug, Clone, PartialEq)]
enum ShellAction {
    Run(Msg, Show),
    Show(Show),
    Help,
    Quit,
}

const SHELL_HELP: &str = "\
ls                     list workspaces
open <workspace>       select a workspace
view <variant>         show origin, trans, explain or thread
run <kind>             start translate, explain or thread
ingest <file|url>      convert a new document
rm <variant>           delete a generated artifact
delete <workspace>     delete a workspace (then confirm or cancel)
download <path>        save the workspace as a zip archive
doc                    show the current document
sessions               list saved conversations
restore <id>           view a saved conversation
attach <file|url>      attach an image to the next message
detach <index>         drop a pending attachment
ask <text>             send a message (also: ? <text>)
chat                   show the conversation
new                    start a fresh conversation
quit
";

fn parse_shell_line(line: &str) -> Result<Option<ShellAction>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if let Some(question) = line.strip_prefix('?') {
        return Ok(Some(ShellAction::Run(
            Msg::ChatSubmitted(question.trim().to_string()),
            Show::Reply,
        )));
    }
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(word, rest)| (word, rest.trim()));
    let argument = |what: &str| {
        if rest.is_empty() {
            Err(format!("{word} needs {what}"))
        } else {
            Ok(rest.to_string())
        }
    };
    let variant = || {
        Variant::parse(rest).ok_or_else(|| format!("unknown variant {rest:?}"))
    };

    let action = match word {
        "ls" => ShellAction::Run(Msg::RefreshWorkspaces, Show::Workspaces),
        "open" => ShellAction::Run(
            Msg::WorkspaceSelected(WorkspaceName::new(argument("a workspace")?)),
            Show::Document,
        ),
        "view" => ShellAction::Run(Msg::VariantRequested(variant()?), Show::Document),
        "run" => {
            let kind = match rest {
                "translate" | "trans" => JobKind::Translate,
                "explain" => JobKind::Explain,
                "thread" | "threadify" => JobKind::Threadify,
                other => return Err(format!("unknown run {other:?}")),
            };
            ShellAction::Run(Msg::DeriveRequested(kind), Show::Nothing)
        }
        "ingest" => ShellAction::Run(
            Msg::IngestRequested(document_source(&argument("a file or url")?)),
            Show::Nothing,
        ),
        "rm" => ShellAction::Run(Msg::DeleteVariantRequested(variant()?), Show::Document),
        "delete" => ShellAction::Run(
            Msg::DeleteWorkspaceRequested(WorkspaceName::new(argument("a workspace")?)),
            Show::Nothing,
        ),
        "confirm" => ShellAction::Run(Msg::DeleteWorkspaceConfirmed, Show::Workspaces),
        "cancel" => ShellAction::Run(Msg::DeleteWorkspaceCancelled, Show::Nothing),
        "download" => ShellAction::Run(
            Msg::DownloadRequested {
                destination: PathBuf::from(argument("a path")?),
            },
            Show::Nothing,
        ),
        "doc" => ShellAction::Show(Show::Document),
        "sessions" => ShellAction::Show(Show::Sessions),
        "restore" => ShellAction::Run(
            Msg::SessionRestoreRequested(SessionId::new(argument("a session id")?)),
            Show::Transcript,
        ),
        "attach" => ShellAction::Run(
            Msg::AttachmentAdded(PendingAttachment::new(argument("a file or url")?)),
            Show::Nothing,
        ),
        "detach" => {
            let index = rest
                .parse::<usize>()
                .map_err(|_| format!("detach needs an index, got {rest:?}"))?;
            ShellAction::Run(Msg::AttachmentRemoved(index), Show::Nothing)
        }
        "ask" => ShellAction::Run(Msg::ChatSubmitted(rest.to_string()), Show::Reply),
        "chat" => ShellAction::Show(Show::Transcript),
        "new" => ShellAction::Run(Msg::ChatReset, Show::Nothing),
        "help" => ShellAction::Help,
        "quit" | "exit" => ShellAction::Quit,
        other => return Err(format!("unknown command {other:?}, try help")),
    };
    Ok(Some(action))
}

fn shell(client: &mut Client) -> anyhow::Result<()> {
    client.step(Msg::RefreshWorkspaces);
    if let Some(last) = load_last_workspace(&client.state_dir) {
        if client
            .session
            .view()
            .workspaces
            .iter()
            .any(|entry| entry.name == last)
        {
            client.step(Msg::WorkspaceSelected(last));
        }
    }
    print!("{}", workspaces_text(&client.session.view()));

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("scholar> ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let show = match parse_shell_line(&line?) {
            Ok(None) => continue,
            Ok(Some(ShellAction::Quit)) => break,
            Ok(Some(ShellAction::Help)) => {
                print!("{SHELL_HELP}");
                continue;
            }
            Ok(Some(ShellAction::Show(show))) => show,
            Ok(Some(ShellAction::Run(msg, show))) => {
                let selected = matches!(msg, Msg::WorkspaceSelected(_));
                let notice = client.step(msg);
                if selected && notice.is_none() {
                    save_last_workspace(
                        &client.state_dir,
                        client.session.view().active_workspace.as_ref(),
                    );
                }
                if let Some(pending) = client.session.view().pending_delete {
                    println!("Type confirm to delete {pending}, or cancel.");
                }
                show
            }
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        let view = client.session.view();
        let text = match show {
            Show::Nothing => String::new(),
            Show::Workspaces => workspaces_text(&view),
            Show::Document => document_text(&view),
            Show::Sessions => sessions_text(&view),
            Show::Transcript => transcript_text(&view),
            Show::Reply => last_reply(client),
        };
        print!("{text}");
    }
    Ok(())
}
