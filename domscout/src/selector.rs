use std::fmt;

use crate::errors::QueryError;

/// Represents ways to locate a node in the page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by `id` attribute
    Id(String),
    /// Select using an XPath-style path expression
    Path(String),
    /// Select using a CSS selector
    Css(String),
    /// Select by `name` attribute
    Name(String),
    /// Select by the full `class` attribute string
    ClassName(String),
    /// Select text nodes by their trimmed content
    Text(String),
    /// Select by tag name
    TagName(String),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl Selector {
    /// The pattern the strategy matches against.
    pub fn pattern(&self) -> &str {
        match self {
            Selector::Id(p)
            | Selector::Path(p)
            | Selector::Css(p)
            | Selector::Name(p)
            | Selector::ClassName(p)
            | Selector::Text(p)
            | Selector::TagName(p)
            | Selector::Invalid(p) => p,
        }
    }

    /// Suffix shared by the exported entry point names (`byId`, `setTextById`, ...).
    fn call_suffix(&self) -> &'static str {
        match self {
            Selector::Id(_) => "Id",
            Selector::Path(_) => "Path",
            Selector::Css(_) => "Selector",
            Selector::Name(_) => "Name",
            Selector::ClassName(_) => "Class",
            Selector::Text(_) => "Text",
            Selector::TagName(_) => "Tag",
            Selector::Invalid(_) => "Invalid",
        }
    }

    fn from_call_suffix(suffix: &str, pattern: &str) -> Option<Selector> {
        let pattern = pattern.to_string();
        Some(match suffix {
            "Id" => Selector::Id(pattern),
            "Path" => Selector::Path(pattern),
            "Selector" => Selector::Css(pattern),
            "Name" => Selector::Name(pattern),
            "Class" => Selector::ClassName(pattern),
            "Text" => Selector::Text(pattern),
            "Tag" => Selector::TagName(pattern),
            _ => return None,
        })
    }

    /// Rejects selectors the engine cannot run.
    pub fn validate(&self) -> Result<(), QueryError> {
        match self {
            Selector::Invalid(reason) => Err(QueryError::InvalidSelector(reason.clone())),
            Selector::Path(expr) => crate::xpath::PathExpr::parse(expr).map(|_| ()),
            Selector::Css(css) if css.trim().is_empty() => {
                Err(QueryError::InvalidSelector("empty CSS selector".to_string()))
            }
            Selector::TagName(tag) if tag.trim().is_empty() => {
                Err(QueryError::InvalidSelector("empty tag name".to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Id(p) => write!(f, "id:{p}"),
            Selector::Path(p) => write!(f, "xpath:{p}"),
            Selector::Css(p) => write!(f, "css:{p}"),
            Selector::Name(p) => write!(f, "name:{p}"),
            Selector::ClassName(p) => write!(f, "classname:{p}"),
            Selector::Text(p) => write!(f, "text:{p}"),
            Selector::TagName(p) => write!(f, "tag:{p}"),
            Selector::Invalid(reason) => write!(f, "invalid:{reason}"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let lower = s.to_ascii_lowercase();
        let after = |prefix: &str| s[prefix.len()..].to_string();

        match lower.as_str() {
            _ if lower.starts_with("id:") => Selector::Id(after("id:")),
            _ if lower.starts_with("xpath:") => Selector::Path(after("xpath:")),
            _ if lower.starts_with("css:") => Selector::Css(after("css:")),
            _ if lower.starts_with("name:") => Selector::Name(after("name:")),
            _ if lower.starts_with("classname:") => Selector::ClassName(after("classname:")),
            _ if lower.starts_with("class:") => Selector::ClassName(after("class:")),
            _ if lower.starts_with("text:") => Selector::Text(after("text:")),
            _ if lower.starts_with("tag:") => Selector::TagName(after("tag:")),
            _ if s.starts_with('#') && s.len() > 1 => Selector::Id(s[1..].to_string()),
            _ if s.starts_with('/') || s.starts_with("(/") => Selector::Path(s.to_string()),
            _ => Selector::Invalid(format!(
                "Unknown selector format: \"{s}\". Use prefixes like 'id:', 'xpath:', 'css:', 'name:', 'classname:', 'text:' or 'tag:' to specify the selector type."
            )),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

/// What happens to matching candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Action {
    /// Report every visible match, then terminate.
    #[default]
    Report,
    /// Click the first match, then terminate.
    Click,
}

impl Action {
    /// Parses the optional string flag of the call boundary: `"true"` clicks,
    /// `"false"` or no flag reports.
    pub fn from_flag(flag: Option<&str>) -> Result<Self, QueryError> {
        match flag {
            None | Some("false") => Ok(Action::Report),
            Some("true") => Ok(Action::Click),
            Some(other) => Err(QueryError::InvalidArgument(format!(
                "action flag must be \"true\" or \"false\", got {other:?}"
            ))),
        }
    }

    pub fn as_flag(self) -> &'static str {
        match self {
            Action::Report => "false",
            Action::Click => "true",
        }
    }
}

/// One validated call into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    AllElements,
    AllTexts,
    Find { selector: Selector, action: Action },
    SetText { selector: Selector, text: String },
}

impl Request {
    pub fn find(selector: impl Into<Selector>) -> Self {
        Request::Find {
            selector: selector.into(),
            action: Action::Report,
        }
    }

    pub fn click(selector: impl Into<Selector>) -> Self {
        Request::Find {
            selector: selector.into(),
            action: Action::Click,
        }
    }

    pub fn set_text(selector: impl Into<Selector>, text: impl Into<String>) -> Self {
        Request::SetText {
            selector: selector.into(),
            text: text.into(),
        }
    }

    /// Builds a request from an exported entry point name and its string
    /// arguments, the only shape the page bridge can carry.
    pub fn from_call(name: &str, args: &[&str]) -> Result<Self, QueryError> {
        let request = match name {
            "allElements" => {
                expect_args(name, args, 0, 0)?;
                Request::AllElements
            }
            "allTexts" => {
                expect_args(name, args, 0, 0)?;
                Request::AllTexts
            }
            _ if name.starts_with("setTextBy") => {
                let suffix = &name["setTextBy".len()..];
                let selector = Selector::from_call_suffix(suffix, args_first(args))
                    .ok_or_else(|| QueryError::UnknownEntryPoint(name.to_string()))?;
                expect_args(name, args, 2, 2)?;
                Request::SetText {
                    selector,
                    text: args[1].to_string(),
                }
            }
            _ if name.starts_with("by") => {
                let suffix = &name["by".len()..];
                let selector = Selector::from_call_suffix(suffix, args_first(args))
                    .ok_or_else(|| QueryError::UnknownEntryPoint(name.to_string()))?;
                expect_args(name, args, 1, 2)?;
                Request::Find {
                    selector,
                    action: Action::from_flag(args.get(1).copied())?,
                }
            }
            _ => return Err(QueryError::UnknownEntryPoint(name.to_string())),
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        match self {
            Request::AllElements | Request::AllTexts => Ok(()),
            Request::Find { selector, .. } | Request::SetText { selector, .. } => {
                selector.validate()
            }
        }
    }

    /// Name of the exported entry point serving this request.
    pub fn entry_point(&self) -> String {
        match self {
            Request::AllElements => "allElements".to_string(),
            Request::AllTexts => "allTexts".to_string(),
            Request::Find { selector, .. } => format!("by{}", selector.call_suffix()),
            Request::SetText { selector, .. } => format!("setTextBy{}", selector.call_suffix()),
        }
    }

    /// Renders the script invocation a driver injects for this request, e.g.
    /// `byId("login", "true");`.
    pub fn to_call(&self) -> String {
        let args: Vec<String> = match self {
            Request::AllElements | Request::AllTexts => Vec::new(),
            Request::Find { selector, action } => {
                vec![quote(selector.pattern()), quote(action.as_flag())]
            }
            Request::SetText { selector, text } => vec![quote(selector.pattern()), quote(text)],
        };
        format!("{}({});", self.entry_point(), args.join(", "))
    }
}

fn args_first<'a>(args: &[&'a str]) -> &'a str {
    args.first().copied().unwrap_or_default()
}

fn expect_args(name: &str, args: &[&str], min: usize, max: usize) -> Result<(), QueryError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        return Err(QueryError::InvalidArgument(format!(
            "{name} takes {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

fn quote(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}
