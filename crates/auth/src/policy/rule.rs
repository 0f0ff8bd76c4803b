//! Policy rule tuples: `(ptype, up to six positional fields)`.

use serde::{Deserialize, Serialize};

pub const MAX_FIELDS: usize = 6;
pub const GRANT: &str = "p";
pub const GROUPING: &str = "g";

/// A stored rule. Identity is the full `(ptype, fields)` tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolicyRule {
    ptype: String,
    fields: Vec<String>,
}

impl PolicyRule {
    /// Fields are trimmed and capped at [`MAX_FIELDS`].
    pub fn new<I, S>(ptype: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ptype: ptype.into().trim().to_string(),
            fields: fields
                .into_iter()
                .take(MAX_FIELDS)
                .map(|f| f.into().trim().to_string())
                .collect(),
        }
    }

    /// `p` rule: `role` may perform `action` on `resource` within `domain`.
    pub fn grant(
        role: impl Into<String>,
        domain: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self::new(
            GRANT,
            [role.into(), domain.into(), resource.into(), action.into()],
        )
    }

    /// `g` rule: `subject` holds `role` within `domain`.
    pub fn grouping(
        subject: impl Into<String>,
        role: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self::new(GROUPING, [subject.into(), role.into(), domain.into()])
    }

    /// Build from a storage row, dropping blank columns.
    pub fn from_row(ptype: &str, columns: &[Option<String>]) -> Option<Self> {
        let ptype = ptype.trim();
        if ptype.is_empty() {
            return None;
        }
        let fields = columns
            .iter()
            .flatten()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        Some(Self::new(ptype, fields))
    }

    pub fn ptype(&self) -> &str {
        &self.ptype
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Model section of the rule type: `g` for `g`, `g2`, ...; `p` otherwise.
    pub fn section(&self) -> &'static str {
        if self.ptype.starts_with(GROUPING) {
            GROUPING
        } else {
            GRANT
        }
    }

    /// Columns padded to [`MAX_FIELDS`] for row-oriented storage.
    pub fn columns(&self) -> [Option<&str>; MAX_FIELDS] {
        let mut out = [None; MAX_FIELDS];
        for (slot, value) in out.iter_mut().zip(&self.fields) {
            *slot = Some(value.as_str());
        }
        out
    }

    /// True iff every non-blank filter value equals the field at
    /// `field_index + offset`. Out-of-range indexes never match.
    pub fn matches_filter(&self, ptype: &str, field_index: usize, values: &[String]) -> bool {
        if self.ptype != ptype || field_index >= MAX_FIELDS {
            return false;
        }
        values.iter().enumerate().all(|(offset, value)| {
            let value = value.trim();
            value.is_empty() || self.field(field_index + offset) == Some(value)
        })
    }

    /// `p, editor, tenant-42, /docs/1, get`
    pub fn to_line(&self) -> String {
        std::iter::once(self.ptype.as_str())
            .chain(self.fields.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl core::fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.to_line())
    }
}
