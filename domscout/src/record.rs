//! The wire format of an element report.
//!
//! One record is a single string: `id;,text;,name;,className;,tagName;,left;,top;,width;,height`
//! followed, for element candidates only, by `;,` and the attribute list
//! `name::value#$name::value...`. Unset fields are written as `null`.

use serde::{Deserialize, Serialize};

use crate::dom::Rect;
use crate::errors::QueryError;

pub const FIELD_DELIMITER: &str = ";,";
pub const ATTRIBUTE_DELIMITER: &str = "#$";
pub const PAIR_SEPARATOR: &str = "::";
pub const NULL_FIELD: &str = "null";

const BASE_FIELDS: usize = 9;
const GEOMETRY_FIELDS: usize = 4;
const FIRST_GEOMETRY_FIELD: usize = BASE_FIELDS - GEOMETRY_FIELDS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    pub id: Option<String>,
    pub text: Option<String>,
    pub name: Option<String>,
    pub class_name: Option<String>,
    pub tag_name: Option<String>,
    pub rect: Rect,
    /// Present for element candidates, absent for text candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<(String, String)>>,
}

impl ElementRecord {
    pub fn encode(&self) -> String {
        let mut fields: Vec<String> = vec![
            field(&self.id),
            field(&self.text),
            field(&self.name),
            field(&self.class_name),
            field(&self.tag_name),
            self.rect.left.to_string(),
            self.rect.top.to_string(),
            self.rect.width.to_string(),
            self.rect.height.to_string(),
        ];
        if let Some(attributes) = &self.attributes {
            fields.push(encode_attributes(attributes));
        }
        fields.join(FIELD_DELIMITER)
    }

    /// Parses one record. A field spelled `null` reads back as `None`, so a
    /// real value of `"null"` cannot be told apart from an unset one.
    ///
    /// Page text may itself contain `;,`. The id is read from the front and
    /// the geometry from the back; extra pieces in between are joined back
    /// into the text, and extra pieces after the geometry into the attributes.
    pub fn parse(message: &str) -> Result<Self, QueryError> {
        let parts: Vec<&str> = message.split(FIELD_DELIMITER).collect();
        if parts.len() < BASE_FIELDS {
            return Err(QueryError::MalformedRecord(format!(
                "expected at least {BASE_FIELDS} fields, got {}",
                parts.len()
            )));
        }

        let number = |index: usize| -> Result<f64, QueryError> {
            parts[index].trim().parse::<f64>().map_err(|e| {
                QueryError::MalformedRecord(format!("field {index} ({:?}): {e}", parts[index]))
            })
        };
        let geometry = geometry_start(&parts).ok_or_else(|| {
            QueryError::MalformedRecord(format!("no geometry fields in {message:?}"))
        })?;
        let tag = geometry - 1;
        let attributes = parts.get(geometry + GEOMETRY_FIELDS..).filter(|rest| !rest.is_empty());

        Ok(Self {
            id: unfield(parts[0]),
            text: unfield(&parts[1..tag - 2].join(FIELD_DELIMITER)),
            name: unfield(parts[tag - 2]),
            class_name: unfield(parts[tag - 1]),
            tag_name: unfield(parts[tag]),
            rect: Rect::new(
                number(geometry)?,
                number(geometry + 1)?,
                number(geometry + 2)?,
                number(geometry + 3)?,
            ),
            attributes: attributes.map(|rest| parse_attributes(&rest.join(FIELD_DELIMITER))),
        })
    }
}

/// Index of the first of the four geometry fields. The geometry either ends
/// the record or is followed by exactly one attribute field; only when
/// neither reading fits is the first numeric run after the tag taken.
fn geometry_start(parts: &[&str]) -> Option<usize> {
    let numeric = |start: usize| {
        parts[start..start + GEOMETRY_FIELDS]
            .iter()
            .all(|part| part.trim().parse::<f64>().is_ok())
    };
    let last = parts.len().checked_sub(GEOMETRY_FIELDS)?;
    [last, last.saturating_sub(1)]
        .into_iter()
        .filter(|&start| start >= FIRST_GEOMETRY_FIELD)
        .find(|&start| numeric(start))
        .or_else(|| (FIRST_GEOMETRY_FIELD..last).find(|&start| numeric(start)))
}

fn field(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| NULL_FIELD.to_string())
}

fn unfield(raw: &str) -> Option<String> {
    (raw != NULL_FIELD).then(|| raw.to_string())
}

pub fn encode_attributes(attributes: &[(String, String)]) -> String {
    attributes
        .iter()
        .map(|(name, value)| format!("{name}{PAIR_SEPARATOR}{value}"))
        .collect::<Vec<_>>()
        .join(ATTRIBUTE_DELIMITER)
}

/// Splits an attribute list. A piece without `::` can only come from a value
/// that itself contained `#$`, so it is glued back onto the previous value.
pub fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    let mut attributes: Vec<(String, String)> = Vec::new();
    if raw.is_empty() {
        return attributes;
    }
    for piece in raw.split(ATTRIBUTE_DELIMITER) {
        if let Some((name, value)) = piece.split_once(PAIR_SEPARATOR) {
            attributes.push((name.to_string(), value.to_string()));
        } else if let Some((_, value)) = attributes.last_mut() {
            value.push_str(ATTRIBUTE_DELIMITER);
            value.push_str(piece);
        } else {
            attributes.push((piece.to_string(), String::new()));
        }
    }
    attributes
}
