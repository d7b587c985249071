//! The Gemini-style line protocol's response side (spec.md §6): a status
//! code, a one-line meta, and an optional body, rendered as
//! `<code> <meta>\r\n[body]`.

use outpost_common::AppError;

/// A response status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// `10` — the client should prompt for input and resubmit with it as
    /// the query string.
    Input,
    /// `20` — success; `meta` carries the body's MIME type.
    Success,
    /// `30` — redirect; `meta` carries the new path.
    Redirect,
    /// `40` — temporary failure; `meta` carries a human-readable reason.
    TemporaryFailure,
}

impl StatusCode {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Input => 10,
            Self::Success => 20,
            Self::Redirect => 30,
            Self::TemporaryFailure => 40,
        }
    }
}

/// A fully-formed response line (and optional body) for one request.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub meta: String,
    pub body: Option<String>,
}

impl Response {
    #[must_use]
    pub fn input(prompt: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Input,
            meta: prompt.into(),
            body: None,
        }
    }

    #[must_use]
    pub fn success(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Success,
            meta: "text/plain".to_string(),
            body: Some(body.into()),
        }
    }

    #[must_use]
    pub fn success_with_type(mime: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Success,
            meta: mime.into(),
            body: Some(body.into()),
        }
    }

    #[must_use]
    pub fn redirect(path: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Redirect,
            meta: path.into(),
            body: None,
        }
    }

    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            status: StatusCode::TemporaryFailure,
            meta: reason.into(),
            body: None,
        }
    }

    /// Renders the full wire form: `<code> <meta>\r\n` followed by the body
    /// (if any) verbatim.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!("{} {}\r\n", self.status.as_u8(), self.meta);
        if let Some(body) = &self.body {
            out.push_str(body);
        }
        out
    }
}

impl From<AppError> for Response {
    /// Every core/repository error becomes a `40` line; spec.md §7 treats
    /// input errors as never-retried and never logged at error level, which
    /// is exactly what `AppError::gemini_line` already renders for the
    /// JSON-API surface's sibling path.
    fn from(err: AppError) -> Self {
        Self::failure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_renders_code_and_body() {
        let r = Response::success("hello");
        assert_eq!(r.render(), "20 text/plain\r\nhello");
    }

    #[test]
    fn failure_has_no_body() {
        let r = Response::failure("Post not found");
        assert_eq!(r.render(), "40 Post not found\r\n");
    }

    #[test]
    fn input_prompts_without_body() {
        let r = Response::input("Reply text?");
        assert_eq!(r.render(), "10 Reply text?\r\n");
    }
}
