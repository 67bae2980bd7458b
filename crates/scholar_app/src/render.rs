use std::fmt::Write as _;
use std::io::{self, Write};

use scholar_core::{AppViewModel, ChatRole, MessageKind, RunId};

pub fn workspaces_text(view: &AppViewModel) -> String {
    if view.workspaces.is_empty() {
        return "No workspaces.\n".to_string();
    }
    let mut out = String::new();
    for entry in &view.workspaces {
        let marker = if view.active_workspace.as_ref() == Some(&entry.name) {
            '*'
        } else {
            ' '
        };
        let _ = writeln!(out, "{marker} {:<32} {}", entry.label, entry.name);
    }
    out
}

pub fn document_text(view: &AppViewModel) -> String {
    let doc = &view.document;
    let mut out = String::new();
    let title = doc.base_name.as_deref().unwrap_or("(untitled)");
    match doc.variant {
        Some(variant) => {
            let edited = if doc.modified { " (modified)" } else { "" };
            let _ = writeln!(out, "== {title} [{variant}]{edited} ==");
        }
        None => {
            let _ = writeln!(out, "== {title} ==");
        }
    }
    if !doc.content.is_empty() {
        out.push_str(&doc.content);
        if !doc.content.ends_with('\n') {
            out.push('\n');
        }
    }
    if let Some(err) = &doc.error {
        let _ = writeln!(out, "error: {err}");
    }
    if !doc.viewable.is_empty() {
        let names = doc
            .viewable
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let _ = writeln!(out, "-- available: {}", names.join(", "));
    }
    if !doc.derivable.is_empty() {
        let names = doc
            .derivable
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let _ = writeln!(out, "-- can run: {}", names.join(", "));
    }
    out
}

pub fn sessions_text(view: &AppViewModel) -> String {
    if view.chat.sessions.is_empty() {
        return "No saved conversations.\n".to_string();
    }
    let mut out = String::new();
    for session in &view.chat.sessions {
        let marker = if view.chat.live_session.as_ref() == Some(&session.id) {
            '*'
        } else if view.chat.restored_session.as_ref() == Some(&session.id) {
            '>'
        } else {
            ' '
        };
        let _ = writeln!(out, "{marker} {:>6}  {}", session.id, session.label);
    }
    out
}

pub fn transcript_text(view: &AppViewModel) -> String {
    let mut out = String::new();
    for message in &view.chat.messages {
        let speaker = match message.role {
            ChatRole::User => "you",
            ChatRole::Assistant => "scholar",
        };
        match message.kind {
            MessageKind::Text => {
                let _ = writeln!(out, "{speaker}: {}", message.content);
            }
            MessageKind::Image => {
                let _ = writeln!(out, "{speaker}: [image {}]", short_reference(&message.content));
            }
        }
    }
    out
}

/// Data urls are long; only their header is shown.
fn short_reference(reference: &str) -> &str {
    if reference.starts_with("data:") {
        reference.split(',').next().unwrap_or(reference)
    } else {
        reference
    }
}

/// Echoes the progress of the current run as it streams.
#[derive(Debug, Default)]
pub struct JobEcho {
    run: Option<RunId>,
    status: String,
    printed: usize,
    notice: Option<String>,
}

impl JobEcho {
    pub fn observe(&mut self, view: &AppViewModel, out: &mut impl Write) -> io::Result<()> {
        if view.notice != self.notice {
            if let Some(notice) = &view.notice {
                writeln!(out, "! {notice}")?;
            }
            self.notice = view.notice.clone();
        }

        let Some(job) = &view.job else {
            return Ok(());
        };
        if self.run != Some(job.run) {
            self.run = Some(job.run);
            self.status.clear();
            self.printed = 0;
        }
        if job.status_text != self.status {
            if !job.status_text.is_empty() {
                writeln!(out, "[{}] {}", job.kind, job.status_text)?;
            }
            self.status = job.status_text.clone();
        }
        match job.output.get(self.printed..) {
            Some("") => {}
            Some(fresh) => write!(out, "{fresh}")?,
            None => write!(out, "{}", job.output)?,
        }
        self.printed = job.output.len();
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scholar_core::{
        ChatMessage, JobKind, JobPhase, JobView, Variant, WorkspaceEntry, WorkspaceName,
    };

    fn job(output: &str, status: &str) -> JobView {
        JobView {
            run: 1,
            kind: JobKind::Translate,
            phase: JobPhase::Streaming,
            status_text: status.to_string(),
            output: output.to_string(),
            generating: true,
            error: None,
        }
    }

    #[test]
    fn workspace_list_marks_active() {
        let view = AppViewModel {
            workspaces: vec![
                WorkspaceEntry {
                    name: "20240101_a".into(),
                    label: "a".into(),
                },
                WorkspaceEntry {
                    name: "20240102_b".into(),
                    label: "b".into(),
                },
            ],
            active_workspace: Some(WorkspaceName::new("20240102_b")),
            ..AppViewModel::default()
        };
        let lines = workspaces_text(&view);
        let lines = lines.lines().collect::<Vec<_>>();
        assert!(lines[0].starts_with("  a "));
        assert!(lines[1].starts_with("* b "));
        assert!(lines[1].ends_with("20240102_b"));
    }

    #[test]
    fn document_lists_available_and_derivable() {
        let mut view = AppViewModel::default();
        view.document.base_name = Some("paper".into());
        view.document.variant = Some(Variant::Origin);
        view.document.content = "# Paper".into();
        view.document.viewable = vec![Variant::Origin, Variant::Trans];
        view.document.derivable = vec![JobKind::Explain, JobKind::Threadify];
        assert_eq!(
            document_text(&view),
            "== paper [origin] ==\n# Paper\n-- available: origin, trans\n-- can run: explain, threadify\n"
        );
    }

    #[test]
    fn transcript_shortens_inline_images() {
        let mut view = AppViewModel::default();
        view.chat.messages = vec![
            ChatMessage::user_text("what is this?"),
            ChatMessage::user_image("data:image/png;base64,iVBORw0KGgo"),
            ChatMessage::assistant_text("A diagram."),
        ];
        assert_eq!(
            transcript_text(&view),
            "you: what is this?\nyou: [image data:image/png;base64]\nscholar: A diagram.\n"
        );
    }

    #[test]
    fn echo_prints_only_new_output() {
        let mut echo = JobEcho::default();
        let mut out = Vec::new();
        let mut view = AppViewModel {
            job: Some(job("Hal", "Translating")),
            ..AppViewModel::default()
        };
        echo.observe(&view, &mut out).unwrap();
        view.job = Some(job("Hallo Welt", "Translating"));
        echo.observe(&view, &mut out).unwrap();
        view.notice = Some("translate failed: boom".into());
        echo.observe(&view, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[translate] Translating\nHallo Welt! translate failed: boom\n"
        );
    }
}
