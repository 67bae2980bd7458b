use std::time::Duration;

use scholar_core::WorkspaceName;

/// Bounded retry for artifact fetches: `max_attempts` tries in total with a
/// fixed `delay` between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    /// Tenant the workspaces belong to. `None` talks to an unscoped server.
    pub username: Option<String>,
    pub connect_timeout: Duration,
    /// Applies to request/response calls. Job streams are not bounded.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5601".to_string(),
            username: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientSettings {
    /// Server path of a workspace: `<user>/<name>` when scoped.
    pub fn workspace_path(&self, workspace: &WorkspaceName) -> String {
        match &self.username {
            Some(user) => format!("{user}/{workspace}"),
            None => workspace.to_string(),
        }
    }

    /// Removes this tenant's prefix from a server-reported workspace path.
    pub fn strip_tenant<'a>(&self, reported: &'a str) -> &'a str {
        self.username
            .as_deref()
            .and_then(|user| reported.strip_prefix(user))
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(reported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_paths_round_trip() {
        let settings = ClientSettings {
            username: Some("alice".into()),
            ..ClientSettings::default()
        };
        assert_eq!(settings.workspace_path(&"2024_paper".into()), "alice/2024_paper");
        assert_eq!(settings.strip_tenant("alice/2024_paper"), "2024_paper");
        assert_eq!(settings.strip_tenant("bob/2024_paper"), "bob/2024_paper");
        assert_eq!(settings.strip_tenant("alice2/x"), "alice2/x");
    }

    #[test]
    fn unscoped_paths_are_bare() {
        let settings = ClientSettings::default();
        assert_eq!(settings.workspace_path(&"w".into()), "w");
        assert_eq!(settings.strip_tenant("alice/w"), "alice/w");
    }
}
