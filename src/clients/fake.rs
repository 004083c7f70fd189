//! In-memory stand-in for the GitHub contents, refs and repos endpoints.
//!
//! It enforces the same sha preconditions as the real API so the
//! optimistic-concurrency paths can be exercised without a network.

use std::collections::BTreeMap;
use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use serde_json::Value;
use serde_json::json;

use super::github::ApiResponse;
use super::github::GithubOps;
use super::github::Method;

#[derive(Default)]
struct Repo {
    html_url: String,
    default_branch: String,
    /// branch -> tip sha
    branches: BTreeMap<String, String>,
    /// (branch, path) -> (content, sha)
    files: HashMap<(String, String), (String, String)>,
}

#[derive(Default)]
struct State {
    repos: HashMap<String, Repo>,
    next_sha: u64,
    requests: Vec<(Method, String)>,
    /// Content written by "someone else" right after the next file read
    interleaved_write: Option<String>,
}

impl State {
    fn sha(&mut self) -> String {
        self.next_sha += 1;
        format!("{:040x}", self.next_sha)
    }
}

#[derive(Default)]
pub struct FakeGithub {
    state: Mutex<State>,
}

impl FakeGithub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a repository with a single default branch
    pub fn with_repo(self, full_name: &str, default_branch: &str) -> Self {
        {
            let mut state = self.state.lock();
            let tip = state.sha();
            let repo = Repo {
                html_url: format!("https://github.com/{}", full_name),
                default_branch: default_branch.to_string(),
                branches: BTreeMap::from([(default_branch.to_string(), tip)]),
                files: HashMap::new(),
            };
            state.repos.insert(full_name.to_string(), repo);
        }
        self
    }

    pub fn with_branch(self, full_name: &str, branch: &str) -> Self {
        {
            let mut state = self.state.lock();
            let tip = state.sha();
            if let Some(repo) = state.repos.get_mut(full_name) {
                repo.branches.insert(branch.to_string(), tip);
            }
        }
        self
    }

    pub fn with_file(self, full_name: &str, branch: &str, path: &str, content: &str) -> Self {
        self.write_file(full_name, branch, path, content);
        self
    }

    /// Overwrite a file out of band, as another client would
    pub fn write_file(&self, full_name: &str, branch: &str, path: &str, content: &str) {
        let mut state = self.state.lock();
        let sha = state.sha();
        if let Some(repo) = state.repos.get_mut(full_name) {
            repo.files.insert(
                (branch.to_string(), path.to_string()),
                (content.to_string(), sha),
            );
        }
    }

    /// Make the next request race with an external write if it reads an existing file
    pub fn interleave_write_after_next_read(&self, content: &str) {
        self.state.lock().interleaved_write = Some(content.to_string());
    }

    pub fn file(&self, full_name: &str, branch: &str, path: &str) -> Option<String> {
        let state = self.state.lock();
        let repo = state.repos.get(full_name)?;
        repo.files
            .get(&(branch.to_string(), path.to_string()))
            .map(|(content, _)| content.clone())
    }

    pub fn branch_tip(&self, full_name: &str, branch: &str) -> Option<String> {
        let state = self.state.lock();
        state.repos.get(full_name)?.branches.get(branch).cloned()
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.state.lock().requests.clone()
    }

    pub fn mutating_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|(method, _)| *method != Method::Get)
            .count()
    }
}

fn not_found() -> ApiResponse {
    ApiResponse::new(404, json!({"message": "Not Found"}))
}

fn str_of<'a>(payload: &'a Option<Value>, key: &str) -> Option<&'a str> {
    payload.as_ref()?.get(key)?.as_str()
}

impl GithubOps for FakeGithub {
    async fn request(&self, method: Method, path: &str, payload: Option<Value>) -> ApiResponse {
        let mut state = self.state.lock();
        state.requests.push((method, path.to_string()));

        let (path, query) = path.split_once('?').unwrap_or((path, ""));
        let git_ref = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("ref="))
            .map(str::to_string);

        if method == Method::Post && path == "/user/repos" {
            let Some(name) = str_of(&payload, "name") else {
                return ApiResponse::new(422, json!({"message": "name missing"}));
            };
            let full_name = format!("octo/{}", name);
            if state.repos.contains_key(&full_name) {
                return ApiResponse::new(
                    422,
                    json!({"message": "Repository creation failed: name already exists on this account"}),
                );
            }
            let tip = state.sha();
            let html_url = format!("https://github.com/{}", full_name);
            state.repos.insert(
                full_name.clone(),
                Repo {
                    html_url: html_url.clone(),
                    default_branch: "main".to_string(),
                    branches: BTreeMap::from([("main".to_string(), tip)]),
                    files: HashMap::new(),
                },
            );
            return ApiResponse::new(
                201,
                json!({"full_name": full_name, "html_url": html_url, "default_branch": "main"}),
            );
        }

        let Some(rest) = path.strip_prefix("/repos/") else {
            return not_found();
        };
        let mut parts = rest.splitn(3, '/');
        let full_name = match (parts.next(), parts.next()) {
            (Some(owner), Some(name)) => format!("{}/{}", owner, name),
            _ => return not_found(),
        };
        let tail = parts.next().unwrap_or("");

        if !state.repos.contains_key(&full_name) {
            return not_found();
        }
        let interleaved = state.interleaved_write.take();
        let fresh_sha = state.sha();
        let repo = state.repos.get_mut(&full_name).expect("checked above");
        let branch = git_ref
            .or_else(|| str_of(&payload, "branch").map(str::to_string))
            .unwrap_or_else(|| repo.default_branch.clone());

        match (method, tail) {
            (Method::Get, "") => ApiResponse::new(
                200,
                json!({
                    "full_name": full_name,
                    "html_url": repo.html_url,
                    "default_branch": repo.default_branch,
                }),
            ),
            (Method::Get, "branches") => ApiResponse::new(
                200,
                Value::Array(
                    repo.branches
                        .keys()
                        .map(|name| json!({"name": name}))
                        .collect(),
                ),
            ),
            (Method::Get, "contents") => {
                let mut names: Vec<&String> = repo
                    .files
                    .keys()
                    .filter(|(b, _)| *b == branch)
                    .map(|(_, p)| p)
                    .collect();
                names.sort();
                ApiResponse::new(
                    200,
                    Value::Array(
                        names
                            .into_iter()
                            .map(|name| json!({"name": name, "type": "file"}))
                            .collect(),
                    ),
                )
            }
            (Method::Post, "git/refs") => {
                let new_ref = str_of(&payload, "ref").unwrap_or_default();
                let sha = str_of(&payload, "sha").unwrap_or_default().to_string();
                let Some(name) = new_ref.strip_prefix("refs/heads/") else {
                    return ApiResponse::new(422, json!({"message": "Reference name is invalid"}));
                };
                if repo.branches.contains_key(name) {
                    ApiResponse::new(422, json!({"message": "Reference already exists"}))
                } else {
                    repo.branches.insert(name.to_string(), sha.clone());
                    ApiResponse::new(201, json!({"ref": new_ref, "object": {"sha": sha}}))
                }
            }
            (Method::Get, tail) if tail.starts_with("git/refs/heads/") => {
                let name = &tail["git/refs/heads/".len()..];
                match repo.branches.get(name) {
                    Some(sha) => ApiResponse::new(
                        200,
                        json!({"ref": format!("refs/heads/{}", name), "object": {"sha": sha}}),
                    ),
                    None => not_found(),
                }
            }
            (method, tail) if tail.starts_with("contents/") => {
                let file_path = tail["contents/".len()..].to_string();
                if !repo.branches.contains_key(&branch) {
                    return ApiResponse::new(404, json!({"message": format!("No commit found for the ref {}", branch)}));
                }
                let key = (branch.clone(), file_path.clone());
                let existing = repo.files.get(&key).cloned();
                match method {
                    Method::Get => match existing {
                        Some((content, sha)) => {
                            if let Some(next) = interleaved {
                                repo.files.insert(key, (next, fresh_sha));
                            }
                            ApiResponse::new(
                                200,
                                json!({
                                    "name": file_path,
                                    "sha": sha,
                                    "encoding": "base64",
                                    "content": wrap_base64(&STANDARD.encode(content)),
                                    "html_url": format!("{}/blob/{}/{}", repo.html_url, branch, file_path),
                                }),
                            )
                        }
                        None => not_found(),
                    },
                    Method::Put => {
                        let given_sha = str_of(&payload, "sha");
                        let encoded = str_of(&payload, "content").unwrap_or_default();
                        let Ok(bytes) = STANDARD.decode(encoded) else {
                            return ApiResponse::new(422, json!({"message": "content is not valid Base64"}));
                        };
                        let content = String::from_utf8_lossy(&bytes).into_owned();
                        match (existing, given_sha) {
                            (Some(_), None) => ApiResponse::new(
                                422,
                                json!({"message": "Invalid request.\n\n\"sha\" wasn't supplied."}),
                            ),
                            (Some((_, sha)), Some(given)) if sha != given => ApiResponse::new(
                                409,
                                json!({"message": format!("{} does not match {}", file_path, given)}),
                            ),
                            (Some(_), Some(_)) => {
                                repo.files.insert(key, (content, fresh_sha.clone()));
                                ApiResponse::new(200, json!({"content": {"sha": fresh_sha}}))
                            }
                            (None, _) => {
                                repo.files.insert(key, (content, fresh_sha.clone()));
                                ApiResponse::new(201, json!({"content": {"sha": fresh_sha}}))
                            }
                        }
                    }
                    Method::Delete => match (existing, str_of(&payload, "sha")) {
                        (None, _) => not_found(),
                        (Some((_, sha)), Some(given)) if sha == given => {
                            repo.files.remove(&key);
                            ApiResponse::new(200, json!({"content": null}))
                        }
                        (Some(_), given) => ApiResponse::new(
                            409,
                            json!({"message": format!("{} does not match {}", file_path, given.unwrap_or(""))}),
                        ),
                    },
                    Method::Post => not_found(),
                }
            }
            _ => not_found(),
        }
    }
}

/// GitHub wraps base64 content at 60 columns
fn wrap_base64(encoded: &str) -> String {
    encoded
        .as_bytes()
        .chunks(60)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}
