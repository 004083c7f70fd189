use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use tracing::instrument;

use super::repo_path;
use super::selected_context;
use crate::clients::github::ApiResponse;
use crate::clients::github::GithubOps;
use crate::clients::github::Method;
use crate::config::Config;
use crate::context::ContextOps;
use crate::context::RepoAction;
use crate::context::UserContext;
use crate::context::UserId;
use crate::error::Done;
use crate::error::OpError;
use crate::error::OpResult;
use crate::sanitize::sanitize_filename;

/// Largest file body accepted for create and edit, in characters
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Longest excerpt returned for display by `view`, in characters
pub const VIEW_DISPLAY_CHARS: usize = 1_500;

const TRUNCATION_MARKER: &str = "...";

// -----------------------------------------------------------------------------
// Types

/// A file read back from the current branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileView {
    pub name: String,
    pub sha: String,
    /// Full decoded content
    pub content: String,
    /// `content` cut to [`VIEW_DISPLAY_CHARS`] with a trailing marker
    pub display: String,
    pub truncated: bool,
    pub html_url: Option<String>,
}

/// An entry at the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// `file`, `dir`, `symlink` or `submodule`
    pub kind: String,
}

/// Body of a contents lookup that resolved to a single entry
#[derive(Debug, Deserialize)]
struct ContentFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    sha: String,
    #[serde(default)]
    content: String,
    encoding: Option<String>,
    html_url: Option<String>,
}

/// File operations on the user's current repository and branch.
pub struct Files<'a, C, H> {
    ctx: &'a C,
    gh: &'a H,
    config: &'a Config,
}

// -----------------------------------------------------------------------------
// Files impl

impl<'a, C: ContextOps, H: GithubOps> Files<'a, C, H> {
    pub fn new(ctx: &'a C, gh: &'a H, config: &'a Config) -> Self {
        Self { ctx, gh, config }
    }

    /// Create a file that must not exist yet.
    #[instrument(skip(self, content))]
    pub async fn create(&self, user_id: UserId, filename: &str, content: &str) -> OpResult {
        let filename = clean_filename(filename)?;
        let ctx = selected_context(self.ctx, self.config, user_id).await?;
        check_size(content)?;

        let path = contents_path(&ctx.default_repo, &filename);
        let existing = self.gh.request(Method::Get, &at_branch(&path, &ctx), None).await;
        match existing.status {
            200 => {
                return Err(OpError::AlreadyExists(format!(
                    "File `{}` already exists on `{}`. Use edit instead.",
                    filename, ctx.current_branch
                )));
            }
            404 => {}
            _ => return Err(OpError::from_response(&existing)),
        }

        let payload = json!({
            "message": ctx.commit_message_for("Create", &filename),
            "content": STANDARD.encode(content),
            "branch": ctx.current_branch,
        });
        let resp = self.gh.request(Method::Put, &path, Some(payload)).await;
        if !resp.is(201) {
            return Err(OpError::from_response(&resp));
        }

        self.ctx
            .record_repo_action(
                user_id,
                RepoAction::new(&ctx.default_repo, "create_file", Some(&filename)),
            )
            .await;
        Ok(Done::message(with_link(
            format!(
                "File `{}` created in `{}` on `{}`",
                filename, ctx.default_repo, ctx.current_branch
            ),
            &resp,
        ))
        .with_rate_limit(resp.rate_limit))
    }

    /// Replace the content of an existing file, guarded by its current sha.
    #[instrument(skip(self, content))]
    pub async fn edit(&self, user_id: UserId, filename: &str, content: &str) -> OpResult {
        let filename = clean_filename(filename)?;
        let ctx = selected_context(self.ctx, self.config, user_id).await?;
        check_size(content)?;

        let path = contents_path(&ctx.default_repo, &filename);
        let sha = self.current_sha(&path, &filename, &ctx).await?;

        let payload = json!({
            "message": ctx.commit_message_for("Update", &filename),
            "content": STANDARD.encode(content),
            "sha": sha,
            "branch": ctx.current_branch,
        });
        let resp = self.gh.request(Method::Put, &path, Some(payload)).await;
        if !resp.is(200) {
            return Err(precondition_failure(&resp, &filename));
        }

        self.ctx
            .record_repo_action(
                user_id,
                RepoAction::new(&ctx.default_repo, "edit_file", Some(&filename)),
            )
            .await;
        Ok(Done::message(with_link(
            format!(
                "File `{}` updated in `{}` on `{}`",
                filename, ctx.default_repo, ctx.current_branch
            ),
            &resp,
        ))
        .with_rate_limit(resp.rate_limit))
    }

    /// Delete an existing file, guarded by its current sha.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: UserId, filename: &str) -> OpResult {
        let filename = clean_filename(filename)?;
        let ctx = selected_context(self.ctx, self.config, user_id).await?;

        let path = contents_path(&ctx.default_repo, &filename);
        let sha = self.current_sha(&path, &filename, &ctx).await?;

        let payload = json!({
            "message": ctx.commit_message_for("Delete", &filename),
            "sha": sha,
            "branch": ctx.current_branch,
        });
        let resp = self.gh.request(Method::Delete, &path, Some(payload)).await;
        if !resp.is(200) {
            return Err(precondition_failure(&resp, &filename));
        }

        self.ctx
            .record_repo_action(
                user_id,
                RepoAction::new(&ctx.default_repo, "delete_file", Some(&filename)),
            )
            .await;
        Ok(Done::message(format!(
            "File `{}` deleted from `{}` on `{}`",
            filename, ctx.default_repo, ctx.current_branch
        ))
        .with_rate_limit(resp.rate_limit))
    }

    /// Read a file from the current branch.
    #[instrument(skip(self))]
    pub async fn view(&self, user_id: UserId, filename: &str) -> OpResult<FileView> {
        let filename = clean_filename(filename)?;
        let ctx = selected_context(self.ctx, self.config, user_id).await?;

        let path = contents_path(&ctx.default_repo, &filename);
        let resp = self.gh.request(Method::Get, &at_branch(&path, &ctx), None).await;
        if !resp.is(200) {
            return Err(not_found_unless_transient(&resp, &filename, &ctx));
        }

        let file = parse_file(&resp, &filename)?;
        let content = decode_content(&file, resp.status)?;
        let (display, truncated) = truncate_for_display(&content);
        let view = FileView {
            name: filename,
            sha: file.sha,
            content,
            display,
            truncated,
            html_url: file.html_url,
        };
        let message = format!("`{}` on `{}`", view.name, ctx.current_branch);
        Ok(Done::new(message, view).with_rate_limit(resp.rate_limit))
    }

    /// List the entries at the root of the current branch.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: UserId) -> OpResult<Vec<DirEntry>> {
        let ctx = selected_context(self.ctx, self.config, user_id).await?;

        let path = format!("{}/contents", repo_path(&ctx.default_repo));
        let resp = self.gh.request(Method::Get, &at_branch(&path, &ctx), None).await;
        match resp.status {
            200 => {}
            404 => {
                return Err(OpError::NotFound(format!(
                    "Nothing to list in `{}` on `{}`: {}",
                    ctx.default_repo,
                    ctx.current_branch,
                    resp.message()
                )));
            }
            _ => return Err(OpError::from_response(&resp)),
        }

        let entries: Vec<DirEntry> = resp
            .body
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| {
                        Some(DirEntry {
                            name: item.get("name")?.as_str()?.to_string(),
                            kind: item
                                .get("type")
                                .and_then(Value::as_str)
                                .unwrap_or("file")
                                .to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let message = format!(
            "{} entries in `{}` on `{}`",
            entries.len(),
            ctx.default_repo,
            ctx.current_branch
        );
        Ok(Done::new(message, entries).with_rate_limit(resp.rate_limit))
    }

    /// Fetch the sha a mutation must present. There is no blind overwrite:
    /// a file we cannot read is reported as not found.
    async fn current_sha(
        &self,
        path: &str,
        filename: &str,
        ctx: &UserContext,
    ) -> Result<String, OpError> {
        let resp = self.gh.request(Method::Get, &at_branch(path, ctx), None).await;
        if !resp.is(200) {
            return Err(not_found_unless_transient(&resp, filename, ctx));
        }
        Ok(parse_file(&resp, filename)?.sha)
    }
}

// -----------------------------------------------------------------------------
// Helpers

fn clean_filename(filename: &str) -> Result<String, OpError> {
    let cleaned = sanitize_filename(filename);
    if cleaned.is_empty() || cleaned == "." {
        return Err(OpError::InvalidInput(format!(
            "`{}` is not a usable file name",
            filename
        )));
    }
    Ok(cleaned)
}

fn check_size(content: &str) -> Result<(), OpError> {
    let len = content.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(OpError::PayloadTooLarge {
            len,
            max: MAX_CONTENT_CHARS,
        });
    }
    Ok(())
}

fn contents_path(repo: &str, filename: &str) -> String {
    format!("{}/contents/{}", repo_path(repo), filename)
}

fn at_branch(path: &str, ctx: &UserContext) -> String {
    format!("{}?ref={}", path, ctx.current_branch)
}

fn not_found_unless_transient(resp: &ApiResponse, filename: &str, ctx: &UserContext) -> OpError {
    if resp.is(408) {
        return OpError::Transient(resp.message());
    }
    OpError::NotFound(format!(
        "File `{}` not found in `{}` on `{}`",
        filename, ctx.default_repo, ctx.current_branch
    ))
}

/// Translate a rejected sha-guarded write. A stale sha is a conflict and is
/// never retried here.
fn precondition_failure(resp: &ApiResponse, filename: &str) -> OpError {
    let message = resp.message();
    let stale = resp.is(409) || (resp.is(422) && message.contains("sha"));
    if stale {
        return OpError::Conflict(format!(
            "File `{}` changed since it was read. View it again and retry. ({})",
            filename, message
        ));
    }
    if resp.is(404) {
        return OpError::NotFound(format!("File `{}` no longer exists: {}", filename, message));
    }
    OpError::from_response(resp)
}

/// Read a 200 contents response as a single file. A directory answers with
/// an array of entries instead.
fn parse_file(resp: &ApiResponse, filename: &str) -> Result<ContentFile, OpError> {
    if resp.body.is_array() {
        return Err(OpError::InvalidInput(format!(
            "`{}` is a directory, not a file",
            filename
        )));
    }
    let file: ContentFile =
        serde_json::from_value(resp.body.clone()).map_err(|err| OpError::Remote {
            status: resp.status,
            message: format!("Unexpected contents response for `{}`: {}", filename, err),
        })?;
    match file.kind.as_deref() {
        None | Some("file") => Ok(file),
        Some(kind) => Err(OpError::InvalidInput(format!(
            "`{}` is a {}, not a file",
            filename, kind
        ))),
    }
}

fn decode_content(file: &ContentFile, status: u16) -> Result<String, OpError> {
    let encoding = file.encoding.as_deref().unwrap_or("base64");
    if encoding != "base64" {
        return Err(OpError::Remote {
            status,
            message: format!("File content is not inline (encoding `{}`)", encoding),
        });
    }
    let encoded: String = file
        .content
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = STANDARD.decode(encoded).map_err(|err| OpError::Remote {
        status,
        message: format!("File content is not valid base64: {}", err),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn truncate_for_display(content: &str) -> (String, bool) {
    match content.char_indices().nth(VIEW_DISPLAY_CHARS) {
        Some((cut, _)) => (format!("{}{}", &content[..cut], TRUNCATION_MARKER), true),
        None => (content.to_string(), false),
    }
}

/// Append the `html_url` GitHub returns for a written file, when present
fn with_link(message: String, resp: &ApiResponse) -> String {
    match resp
        .body
        .get("content")
        .and_then(|c| c.get("html_url"))
        .and_then(Value::as_str)
    {
        Some(url) => format!("{}\n{}", message, url),
        None => message,
    }
}
