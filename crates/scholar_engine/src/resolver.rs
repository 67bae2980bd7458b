use std::sync::LazyLock;

use regex::{Captures, Regex};

use engine_logging::{engine_debug, engine_warn};
use scholar_core::{Variant, WorkspaceName};

use crate::backend::Backend;
use crate::{RetryPolicy, ResolveError};

static IMAGE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\]\((?:\./)?((?:picture|table)-\d+\.png)\)").expect("valid regex")
});

/// Fetches artifact text, retrying while the server has not produced it yet.
pub struct ArtifactResolver<'a> {
    backend: &'a dyn Backend,
    policy: RetryPolicy,
}

impl<'a> ArtifactResolver<'a> {
    pub fn new(backend: &'a dyn Backend, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub async fn resolve(
        &self,
        workspace: &WorkspaceName,
        base_name: &str,
        variant: Variant,
    ) -> Result<String, ResolveError> {
        let file_name = variant.file_name(base_name);
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.backend.fetch_artifact(workspace, &file_name).await {
                Ok(text) => {
                    engine_debug!("Fetched {} on attempt {}", file_name, attempt);
                    return Ok(rewrite_image_refs(&text, |image| {
                        self.backend.content_url(workspace, image)
                    }));
                }
                Err(err) if attempt < max_attempts => {
                    engine_debug!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt,
                        max_attempts,
                        file_name,
                        err
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(err) => {
                    engine_warn!("Giving up on {} after {} attempts", file_name, attempt);
                    return Err(ResolveError {
                        variant,
                        attempts: attempt,
                        last: err,
                    });
                }
            }
        }
    }
}

/// Points relative `picture-N.png` / `table-N.png` image links at `url_for`.
pub fn rewrite_image_refs(text: &str, url_for: impl Fn(&str) -> String) -> String {
    IMAGE_REF
        .replace_all(text, |caps: &Captures<'_>| format!("]({})", url_for(&caps[1])))
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_pattern_compiles() {
        assert!(IMAGE_REF.is_match("](picture-3.png)"));
        assert!(!IMAGE_REF.is_match("](picture.png)"));
    }

    #[test]
    fn rewrites_only_relative_figure_links() {
        let text = "![Local Image](picture-1.png)\n![t](./table-12.png)\n![x](other.png)\n![abs](http://h/picture-2.png)";
        let rewritten = rewrite_image_refs(text, |name| format!("http://h/contents/ws/{name}"));
        assert_eq!(
            rewritten,
            "![Local Image](http://h/contents/ws/picture-1.png)\n![t](http://h/contents/ws/table-12.png)\n![x](other.png)\n![abs](http://h/picture-2.png)"
        );
    }
}
