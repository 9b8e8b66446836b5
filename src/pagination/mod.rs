//! Pagination handling for Forge APIs.
//!
//! Two cursor styles are in use:
//! - data management (OSS) responses carry `items` and an absolute `next` URL whose
//!   `startAt` query parameter addresses the following page;
//! - design automation responses carry `data` and an opaque `paginationToken`.
//!
//! [`PageIterator`] fetches one page per call, only when asked, and stops after the
//! last page. It cannot be restarted.

use crate::client::{RequestExecutor, RequestSpec};
use crate::errors::{ForgeError, ForgeResult, ResponseError};
use crate::transport::encode_component;
use futures::stream::{self, Stream};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Cursor style of a paginated endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStyle {
    /// `items` + `next` URL with `startAt`. `limit` is sent on every request when set.
    StartAt {
        /// Page size.
        limit: Option<u32>,
    },
    /// `data` + `paginationToken`, continued with `page=<token>`.
    Token,
}

/// A page of results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// The items in this page.
    pub items: Vec<T>,
    /// Cursor for the next page: the `startAt` value or the pagination token.
    pub cursor: Option<String>,
}

impl<T: DeserializeOwned> Page<T> {
    /// Parses a page from a response body.
    pub fn parse(style: PaginationStyle, mut body: Value) -> ForgeResult<Self> {
        let (items_field, cursor) = match style {
            PaginationStyle::StartAt { .. } => ("items", start_at_cursor(&body)?),
            PaginationStyle::Token => (
                "data",
                body.get("paginationToken")
                    .and_then(Value::as_str)
                    .filter(|token| !token.is_empty())
                    .map(str::to_string),
            ),
        };

        let items = match body.get_mut(items_field).map(Value::take) {
            Some(Value::Null) | None => Vec::new(),
            Some(items) => serde_json::from_value(items).map_err(|e| {
                ForgeError::deserialization(format!("Failed to deserialize page items: {}", e))
            })?,
        };

        Ok(Self { items, cursor })
    }
}

impl<T> Page<T> {
    /// Returns true if there is a next page.
    pub fn has_next(&self) -> bool {
        self.cursor.is_some()
    }
}

/// Reads `startAt` from the `next` URL. A missing, null or empty `next` ends the sequence.
fn start_at_cursor(body: &Value) -> ForgeResult<Option<String>> {
    let next = match body.get("next").and_then(Value::as_str) {
        Some(next) if !next.is_empty() => next,
        _ => return Ok(None),
    };

    let url = Url::parse(next)
        .map_err(|e| ResponseError::UnexpectedFormat(format!("Invalid next URL {}: {}", next, e)))?;

    let start_at = url
        .query_pairs()
        .find(|(key, _)| key == "startAt")
        .map(|(_, value)| value.into_owned())
        .unwrap_or_default();

    Ok(Some(start_at))
}

fn separator(path: &str) -> char {
    if path.contains('?') {
        '&'
    } else {
        '?'
    }
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazy iterator over the pages of a paginated endpoint.
pub struct PageIterator<T> {
    executor: Arc<RequestExecutor>,
    path: String,
    scopes: Vec<String>,
    style: PaginationStyle,
    cursor: Cursor,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> PageIterator<T> {
    /// Creates a page iterator over `path` (relative to the host).
    pub fn new(
        executor: Arc<RequestExecutor>,
        path: impl Into<String>,
        scopes: &[&str],
        style: PaginationStyle,
    ) -> Self {
        Self {
            executor,
            path: path.into(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            style,
            cursor: Cursor::Start,
            _marker: PhantomData,
        }
    }

    /// Path of the next request, or `None` when the sequence is finished.
    fn next_path(&self) -> Option<String> {
        let sep = separator(&self.path);
        match (&self.cursor, self.style) {
            (Cursor::Done, _) => None,
            (Cursor::Start, PaginationStyle::StartAt { limit: Some(limit) }) => {
                Some(format!("{}{}limit={}", self.path, sep, limit))
            }
            (Cursor::Start, _) => Some(self.path.clone()),
            (Cursor::Next(start_at), PaginationStyle::StartAt { limit }) => {
                let mut path = format!("{}{}startAt={}", self.path, sep, encode_component(start_at));
                if let Some(limit) = limit {
                    path.push_str(&format!("&limit={}", limit));
                }
                Some(path)
            }
            (Cursor::Next(token), PaginationStyle::Token) => {
                Some(format!("{}{}page={}", self.path, sep, encode_component(token)))
            }
        }
    }

    /// Fetches the next page. Returns `None` once the last page has been returned.
    ///
    /// A failed fetch ends the sequence.
    pub async fn next_page(&mut self) -> ForgeResult<Option<Vec<T>>> {
        let path = match self.next_path() {
            Some(path) => path,
            None => return Ok(None),
        };

        debug!(path = %path, "Fetching page");

        let scopes: Vec<&str> = self.scopes.iter().map(String::as_str).collect();
        let result = async {
            let body = self
                .executor
                .execute(RequestSpec::get(path).scopes(&scopes))
                .await?
                .into_json()?;
            Page::<T>::parse(self.style, body)
        }
        .await;

        match result {
            Ok(page) => {
                self.cursor = match page.cursor {
                    Some(cursor) => Cursor::Next(cursor),
                    None => Cursor::Done,
                };
                Ok(Some(page.items))
            }
            Err(err) => {
                self.cursor = Cursor::Done;
                Err(err)
            }
        }
    }

    /// Collects the items of all remaining pages, in order.
    pub async fn collect_all(mut self) -> ForgeResult<Vec<T>> {
        let mut results = Vec::new();
        while let Some(items) = self.next_page().await? {
            results.extend(items);
        }
        Ok(results)
    }
}

impl<T: DeserializeOwned + Send + 'static> PageIterator<T> {
    /// Converts the iterator into a stream of page batches.
    ///
    /// The stream ends after the last page or after the first error.
    pub fn into_stream(self) -> impl Stream<Item = ForgeResult<Vec<T>>> + Send {
        stream::unfold(self, |mut iter| async move {
            match iter.next_page().await {
                Ok(Some(items)) => Some((Ok(items), iter)),
                Ok(None) => None,
                Err(err) => Some((Err(err), iter)),
            }
        })
    }
}
