//! # Placeholders
//!
//! `{{ prefix:name }}` templates resolved against the headers, signal,
//! connection and authorization context at hand.

use crate::error::PlaceholderError;
use serde_json::{Map, Value};
use shared_types::{AuthorizationContext, ConnectionId, Headers, Signal};

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Prefixes recognised as placeholder keys.
const PREFIXES: [&str; 6] = ["header", "thing", "entity", "topic", "connection", "request"];

/// Resolves expression keys to JSON values.
pub trait ValueResolver {
    fn resolve_value(&self, key: &str) -> Result<Option<Value>, PlaceholderError>;
}

/// Everything a placeholder may refer to. All parts are optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderContext<'a> {
    headers: Option<&'a Headers>,
    signal: Option<&'a Signal>,
    connection_id: Option<&'a ConnectionId>,
    auth_context: Option<&'a AuthorizationContext>,
}

impl<'a> PlaceholderContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// External headers. Looked up before the signal's headers.
    #[must_use]
    pub fn with_headers(mut self, headers: &'a Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    #[must_use]
    pub fn with_signal(mut self, signal: &'a Signal) -> Self {
        self.signal = Some(signal);
        self
    }

    #[must_use]
    pub fn with_connection(mut self, connection_id: &'a ConnectionId) -> Self {
        self.connection_id = Some(connection_id);
        self
    }

    #[must_use]
    pub fn with_auth_context(mut self, auth_context: &'a AuthorizationContext) -> Self {
        self.auth_context = Some(auth_context);
        self
    }

    /// Resolve a single key such as `thing:id`.
    ///
    /// `Ok(None)` means the key is valid but has no value in this context.
    pub fn resolve(&self, key: &str) -> Result<Option<String>, PlaceholderError> {
        let key = key.trim();
        let (prefix, name) = key
            .split_once(':')
            .map(|(p, n)| (p.trim(), n.trim()))
            .ok_or_else(|| PlaceholderError::Unknown(key.to_string()))?;

        let unknown = || PlaceholderError::Unknown(key.to_string());

        let value = match prefix {
            "header" => self
                .headers
                .and_then(|h| h.get(name))
                .or_else(|| self.signal.and_then(|s| s.headers().get(name)))
                .map(str::to_string),
            "thing" | "entity" => {
                let entity = self.signal.map(Signal::entity_id);
                match name {
                    "id" => entity.map(ToString::to_string),
                    "namespace" if prefix == "thing" => entity.map(|e| e.namespace().to_string()),
                    "name" if prefix == "thing" => entity.map(|e| e.name().to_string()),
                    _ => return Err(unknown()),
                }
            }
            "topic" => {
                let topic = self.signal.map(Signal::topic_path);
                match name {
                    "full" => topic.map(|t| t.to_string()),
                    "namespace" => topic.map(|t| t.namespace),
                    "entityName" => topic.map(|t| t.entity_name),
                    "group" => topic.map(|t| t.group),
                    "channel" => topic.map(|t| t.channel.as_str().to_string()),
                    "criterion" => topic.map(|t| t.criterion.as_str().to_string()),
                    "action" => topic.and_then(|t| t.action),
                    "subject" => topic.and_then(|t| t.subject),
                    _ => return Err(unknown()),
                }
            }
            "connection" if name == "id" => self.connection_id.map(ToString::to_string),
            "request" if name == "subjectId" => self
                .auth_context
                .and_then(AuthorizationContext::first_subject)
                .map(str::to_string),
            _ => return Err(unknown()),
        };
        Ok(value)
    }

    /// Resolve every placeholder in `template`; any unresolved one fails.
    pub fn resolve_template(&self, template: &str) -> Result<String, PlaceholderError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + OPEN.len()..];
            let end = after
                .find(CLOSE)
                .ok_or_else(|| PlaceholderError::Unterminated(template.to_string()))?;
            let key = after[..end].trim();
            let value = self
                .resolve(key)?
                .ok_or_else(|| PlaceholderError::Unresolved(key.to_string()))?;
            out.push_str(&value);
            rest = &after[end + CLOSE.len()..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Resolve placeholders in every string of a JSON template.
    pub fn resolve_json(&self, template: &Value) -> Result<Value, PlaceholderError> {
        Ok(match template {
            Value::String(s) => Value::String(self.resolve_template(s)?),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.resolve_json(v))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => {
                let mut resolved = Map::with_capacity(map.len());
                for (k, v) in map {
                    resolved.insert(self.resolve_template(k)?, self.resolve_json(v)?);
                }
                Value::Object(resolved)
            }
            other => other.clone(),
        })
    }
}

impl ValueResolver for PlaceholderContext<'_> {
    fn resolve_value(&self, key: &str) -> Result<Option<Value>, PlaceholderError> {
        if is_placeholder_key(key) {
            return Ok(self.resolve(key)?.map(Value::String));
        }
        Ok(self
            .signal
            .and_then(|signal| lookup_path(&entity_view(signal), key).cloned()))
    }
}

/// Whether `key` names a placeholder (as opposed to a JSON path).
pub fn is_placeholder_key(key: &str) -> bool {
    key.split_once(':')
        .map(|(prefix, _)| PREFIXES.contains(&prefix.trim()))
        .unwrap_or(false)
}

/// JSON view of the entity a signal talks about: the extra fields with the
/// payload placed at the signal's path on top.
pub fn entity_view(signal: &Signal) -> Value {
    let mut view = signal
        .extra()
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    if let Some(payload) = signal.payload() {
        insert_at_path(&mut view, signal.path(), payload.clone());
    }
    view
}

fn insert_at_path(root: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        match (root, value) {
            (Value::Object(target), Value::Object(source)) => target.extend(source),
            (root, value) => *root = value,
        }
        return;
    };

    let mut current = root;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.to_string(), value);
    }
}

/// Look up a slash separated path (`attributes/location`).
pub fn lookup_path<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .try_fold(root, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}
