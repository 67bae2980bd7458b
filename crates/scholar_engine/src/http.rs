use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::{multipart, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use engine_logging::{engine_debug, engine_info};
use scholar_core::{
    display_label, AgentContext, ChatMessage, DocumentSource, FileListing, JobKind, JobRequest,
    SessionId, SessionSummary, Variant, WorkspaceEntry, WorkspaceName,
};

use crate::backend::{Backend, ByteStream};
use crate::{BackendError, ClientSettings, FailureKind};

/// [`Backend`] over the scholar HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    settings: ClientSettings,
    base: Url,
    client: reqwest::Client,
    /// Same as `client` without the overall request timeout.
    stream_client: reqwest::Client,
}

#[derive(Deserialize)]
struct DirectoryList {
    directories: Vec<DirectoryEntry>,
}

#[derive(Deserialize)]
struct DirectoryEntry {
    dir_name: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct FileList {
    pdf_file: Option<String>,
    #[serde(default)]
    markdown_files: Vec<String>,
}

#[derive(Deserialize)]
struct SessionList {
    sessions: Vec<SessionSummary>,
}

#[derive(Deserialize)]
struct History {
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct CreatedSession {
    session_id: SessionId,
}

#[derive(Deserialize)]
struct AgentReply {
    response: String,
    state: AgentContext,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpBackend {
    pub fn new(settings: ClientSettings) -> Result<Self, BackendError> {
        let base = Url::parse(&settings.base_url)
            .map_err(|err| BackendError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::new(
                FailureKind::InvalidUrl,
                format!("{} cannot be used as a base url", settings.base_url),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| BackendError::new(FailureKind::Network, err.to_string()))?;
        let stream_client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|err| BackendError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            settings,
            base,
            client,
            stream_client,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn endpoint<I, S>(&self, segments: I) -> Url
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `endpoint` followed by the tenant-scoped workspace path, split into
    /// segments.
    fn scoped_endpoint(&self, route: &str, workspace: &WorkspaceName, file: Option<&str>) -> Url {
        let path = self.settings.workspace_path(workspace);
        let segments = std::iter::once(route)
            .chain(path.split('/'))
            .chain(file)
            .collect::<Vec<_>>();
        self.endpoint(segments)
    }

    fn with_query(&self, mut url: Url, pairs: &[(&str, &str)]) -> Url {
        {
            let mut query = url.query_pairs_mut();
            if let Some(user) = &self.settings.username {
                query.append_pair("username", user);
            }
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, BackendError> {
        engine_debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &serde_json::Value,
    ) -> Result<T, BackendError> {
        engine_debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_json(response).await
    }

    fn username_value(&self) -> serde_json::Value {
        self.settings
            .username
            .as_deref()
            .map_or(serde_json::Value::Null, |user| json!(user))
    }
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn list_workspaces(&self) -> Result<Vec<WorkspaceEntry>, BackendError> {
        let url = self.with_query(self.endpoint(["list_contents"]), &[]);
        let list: DirectoryList = self.get_json(url).await?;
        Ok(list
            .directories
            .into_iter()
            .map(|entry| WorkspaceEntry {
                label: entry
                    .display_name
                    .filter(|label| !label.is_empty())
                    .unwrap_or_else(|| display_label(&entry.dir_name)),
                name: WorkspaceName::new(entry.dir_name),
            })
            .collect())
    }

    async fn list_files(&self, workspace: &WorkspaceName) -> Result<FileListing, BackendError> {
        let url = self.scoped_endpoint("list_files", workspace, None);
        let list: FileList = self.get_json(url).await?;
        Ok(FileListing {
            source_document: list.pdf_file,
            artifacts: list.markdown_files,
        })
    }

    async fn fetch_artifact(
        &self,
        workspace: &WorkspaceName,
        file_name: &str,
    ) -> Result<String, BackendError> {
        let url = self.scoped_endpoint("contents", workspace, Some(file_name));
        engine_debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let body = read_body(response).await?;
        String::from_utf8(body.to_vec())
            .map_err(|err| BackendError::new(FailureKind::Decode, err.to_string()))
    }

    async fn save_artifact(
        &self,
        workspace: &WorkspaceName,
        file_name: &str,
        content: &str,
    ) -> Result<(), BackendError> {
        let body = json!({
            "dir_name": self.settings.workspace_path(workspace),
            "file_name": file_name,
            "content": content,
        });
        let _: serde_json::Value = self.post_json(self.endpoint(["save_markdown"]), &body).await?;
        Ok(())
    }

    async fn delete_artifact(
        &self,
        workspace: &WorkspaceName,
        variant: Variant,
    ) -> Result<(), BackendError> {
        let body = json!({
            "dir_name": workspace.as_str(),
            "username": self.username_value(),
            "suffix": format!("_{}.md", variant.suffix()),
        });
        let _: serde_json::Value = self.post_json(self.endpoint(["delete_file"]), &body).await?;
        Ok(())
    }

    async fn delete_workspace(&self, workspace: &WorkspaceName) -> Result<(), BackendError> {
        let body = json!({
            "dir_name": workspace.as_str(),
            "username": self.username_value(),
        });
        let _: serde_json::Value = self
            .post_json(self.endpoint(["delete_directory"]), &body)
            .await?;
        engine_info!("Deleted workspace {}", workspace);
        Ok(())
    }

    async fn download_workspace(&self, workspace: &WorkspaceName) -> Result<Bytes, BackendError> {
        let url = self.with_query(
            self.endpoint(["download_directory"]),
            &[("dir_name", workspace.as_str())],
        );
        engine_debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        read_body(response).await
    }

    async fn open_job(&self, request: &JobRequest) -> Result<ByteStream, BackendError> {
        let builder = match request {
            JobRequest::Ingest(source) => {
                let url = self.with_query(self.endpoint(["pdf2markdown"]), &[]);
                let builder = self.stream_client.post(url);
                match source {
                    DocumentSource::Url(link) => builder.json(&json!({ "url": link })),
                    DocumentSource::File(path) => {
                        let file_name = path
                            .file_name()
                            .map(|name| name.to_string_lossy().into_owned())
                            .unwrap_or_else(|| "document.pdf".to_string());
                        let bytes = tokio::fs::read(path).await.map_err(|err| {
                            BackendError::new(
                                FailureKind::Io,
                                format!("{}: {err}", path.display()),
                            )
                        })?;
                        let part = multipart::Part::bytes(bytes)
                            .file_name(file_name)
                            .mime_str("application/pdf")
                            .map_err(map_reqwest_error)?;
                        builder.multipart(multipart::Form::new().part("file", part))
                    }
                }
            }
            JobRequest::Derive { kind, workspace } => {
                let route = match kind {
                    JobKind::Translate => "trans_markdown",
                    JobKind::Explain => "explain_paper",
                    JobKind::Threadify => "thread_paper",
                    JobKind::Ingest => {
                        return Err(BackendError::new(
                            FailureKind::InvalidUrl,
                            "ingest runs need a document source",
                        ))
                    }
                };
                self.stream_client
                    .post(self.endpoint([route]))
                    .json(&json!({ "dir_name": self.settings.workspace_path(workspace) }))
            }
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(error_from_body(status, &body));
        }
        engine_info!("{} stream opened", request.kind());
        Ok(response.bytes_stream().map_err(map_reqwest_error).boxed())
    }

    async fn initialize_agent(
        &self,
        workspace: &WorkspaceName,
    ) -> Result<AgentContext, BackendError> {
        let path = self.settings.workspace_path(workspace);
        let mut url = self.endpoint(["initialize_state"]);
        url.query_pairs_mut().append_pair("input_dir", &path);
        self.get_json(url).await
    }

    async fn list_sessions(
        &self,
        workspace: &WorkspaceName,
    ) -> Result<Vec<SessionSummary>, BackendError> {
        let url = self.with_query(
            self.endpoint(["list_chat_sessions"]),
            &[("dir_name", workspace.as_str())],
        );
        let list: SessionList = self.get_json(url).await?;
        Ok(list.sessions)
    }

    async fn load_history(&self, session: &SessionId) -> Result<Vec<ChatMessage>, BackendError> {
        let url = self.with_query(
            self.endpoint(["get_chat_history"]),
            &[("session_id", session.as_str())],
        );
        let history: History = self.get_json(url).await?;
        Ok(history.messages)
    }

    async fn create_session(&self, workspace: &WorkspaceName) -> Result<SessionId, BackendError> {
        let url = self.with_query(
            self.endpoint(["create_chat_session"]),
            &[("dir_name", workspace.as_str())],
        );
        let created: CreatedSession = self.post_json(url, &json!({})).await?;
        Ok(created.session_id)
    }

    async fn delete_session(&self, session: &SessionId) -> Result<(), BackendError> {
        let body = json!({
            "session_id": session.as_str(),
            "username": self.username_value(),
        });
        let _: serde_json::Value = self
            .post_json(self.endpoint(["delete_chat_session"]), &body)
            .await?;
        Ok(())
    }

    async fn bulk_save(
        &self,
        session: &SessionId,
        messages: &[(String, String)],
    ) -> Result<(), BackendError> {
        let messages = messages
            .iter()
            .map(|(role, content)| json!({ "role": role, "content": content }))
            .collect::<Vec<_>>();
        let body = json!({
            "session_id": session.as_str(),
            "messages": messages,
            "username": self.username_value(),
        });
        let _: serde_json::Value = self
            .post_json(self.endpoint(["bulk_save_chat"]), &body)
            .await?;
        Ok(())
    }

    async fn agent_turn(
        &self,
        session: &SessionId,
        user_input: &str,
        agent: &AgentContext,
    ) -> Result<(String, AgentContext), BackendError> {
        let body = json!({
            "state": agent,
            "user_input": user_input,
            "session_id": session.as_str(),
            "username": self.username_value(),
        });
        let reply: AgentReply = self.post_json(self.endpoint(["scholar_agent"]), &body).await?;
        Ok((reply.response, reply.state))
    }

    fn content_url(&self, workspace: &WorkspaceName, file_name: &str) -> String {
        self.scoped_endpoint("contents", workspace, Some(file_name))
            .to_string()
    }
}

async fn read_body(response: Response) -> Result<Bytes, BackendError> {
    let status = response.status();
    let body = response.bytes().await.map_err(map_reqwest_error)?;
    if !status.is_success() {
        return Err(error_from_body(status, &body));
    }
    Ok(body)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let body = read_body(response).await?;
    if let Ok(ErrorBody { error }) = serde_json::from_slice::<ErrorBody>(&body) {
        return Err(BackendError::new(FailureKind::Server, error));
    }
    serde_json::from_slice(&body)
        .map_err(|err| BackendError::new(FailureKind::Decode, err.to_string()))
}

fn error_from_body(status: StatusCode, body: &[u8]) -> BackendError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());
    BackendError::new(FailureKind::HttpStatus(status.as_u16()), message)
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        return BackendError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return BackendError::new(FailureKind::InvalidUrl, err.to_string());
    }
    BackendError::new(FailureKind::Network, err.to_string())
}
