//! Shareable fields and their canonical fingerprint.
//!
//! Each request type has a closed allow-list of field names. Selections are
//! validated by set membership against that list, never by inspecting record
//! structure at runtime.
//!
//! ## Fingerprint
//!
//! A selection's fingerprint is its field names sorted lexicographically and
//! joined with [`FINGERPRINT_SEPARATOR`]. It is order-independent, so
//! `["email", "phone"]` and `["phone", "email"]` collide as duplicates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};

/// Separator between field names in a fingerprint.
pub const FINGERPRINT_SEPARATOR: &str = "+";

/// Modifier asking for a copy of the latest document version.
pub const DOCUMENT_COPY: &str = "documentCopy";

/// The two kinds of share request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestType {
    #[serde(rename = "accountData")]
    Account,
    #[serde(rename = "documentData")]
    Document,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Account => "accountData",
            RequestType::Document => "documentData",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shareable account fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccountField {
    FirstName,
    LastName,
    Email,
    Phone,
}

impl AccountField {
    pub const ALL: [AccountField; 4] = [
        AccountField::FirstName,
        AccountField::LastName,
        AccountField::Email,
        AccountField::Phone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountField::FirstName => "firstName",
            AccountField::LastName => "lastName",
            AccountField::Email => "email",
            AccountField::Phone => "phone",
        }
    }
}

impl FromStr for AccountField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        AccountField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| CoreError::InvalidField(s.to_string()))
    }
}

impl fmt::Display for AccountField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shareable document fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentField {
    DocumentName,
    Holder,
    CountryIssue,
}

impl DocumentField {
    pub const ALL: [DocumentField; 3] = [
        DocumentField::DocumentName,
        DocumentField::Holder,
        DocumentField::CountryIssue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentField::DocumentName => "documentName",
            DocumentField::Holder => "holder",
            DocumentField::CountryIssue => "countryIssue",
        }
    }
}

impl FromStr for DocumentField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        DocumentField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| CoreError::InvalidField(s.to_string()))
    }
}

impl fmt::Display for DocumentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can supply current values for shareable field names.
pub trait FieldSource {
    /// The current value of `name`, or `None` if this source has none.
    fn field_value(&self, name: &str) -> Option<String>;
}

/// A validated, non-empty set of fields for one request type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    Account(BTreeSet<AccountField>),
    Document {
        fields: BTreeSet<DocumentField>,
        document_copy: bool,
    },
}

impl FieldSelection {
    /// Validate raw field names against the allow-list for `request_type`.
    ///
    /// Names are trimmed; repeated names collapse. Unknown names fail with
    /// [`CoreError::InvalidField`], an empty list with [`CoreError::EmptyFieldSet`].
    pub fn parse<S: AsRef<str>>(request_type: RequestType, names: &[S]) -> Result<Self> {
        let selection = match request_type {
            RequestType::Account => {
                let mut fields = BTreeSet::new();
                for name in names {
                    fields.insert(name.as_ref().trim().parse::<AccountField>()?);
                }
                FieldSelection::Account(fields)
            }
            RequestType::Document => {
                let mut fields = BTreeSet::new();
                let mut document_copy = false;
                for name in names {
                    let name = name.as_ref().trim();
                    if name == DOCUMENT_COPY {
                        document_copy = true;
                    } else {
                        fields.insert(name.parse::<DocumentField>()?);
                    }
                }
                FieldSelection::Document {
                    fields,
                    document_copy,
                }
            }
        };

        if selection.is_empty() {
            return Err(CoreError::EmptyFieldSet);
        }
        Ok(selection)
    }

    /// Rebuild a selection from a stored fingerprint.
    pub fn from_fingerprint(request_type: RequestType, fingerprint: &str) -> Result<Self> {
        let names: Vec<&str> = fingerprint
            .split(FINGERPRINT_SEPARATOR)
            .filter(|n| !n.is_empty())
            .collect();
        Self::parse(request_type, &names)
    }

    /// The request type this selection belongs to.
    pub fn request_type(&self) -> RequestType {
        match self {
            FieldSelection::Account(_) => RequestType::Account,
            FieldSelection::Document { .. } => RequestType::Document,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldSelection::Account(fields) => fields.is_empty(),
            FieldSelection::Document {
                fields,
                document_copy,
            } => fields.is_empty() && !document_copy,
        }
    }

    /// Whether a copy of the latest document version is selected.
    pub fn document_copy(&self) -> bool {
        matches!(
            self,
            FieldSelection::Document {
                document_copy: true,
                ..
            }
        )
    }

    /// All selected names, including the `documentCopy` modifier, sorted.
    pub fn names(&self) -> BTreeSet<&'static str> {
        let mut names: BTreeSet<&'static str> = self.value_names().into_iter().collect();
        if self.document_copy() {
            names.insert(DOCUMENT_COPY);
        }
        names
    }

    /// Selected names that carry a field value (excludes `documentCopy`).
    pub fn value_names(&self) -> Vec<&'static str> {
        match self {
            FieldSelection::Account(fields) => fields.iter().map(AccountField::as_str).collect(),
            FieldSelection::Document { fields, .. } => {
                fields.iter().map(DocumentField::as_str).collect()
            }
        }
    }

    /// Canonical, order-independent fingerprint.
    pub fn fingerprint(&self) -> String {
        let names: Vec<&str> = self.names().into_iter().collect();
        names.join(FINGERPRINT_SEPARATOR)
    }

    /// Fields present in both selections.
    ///
    /// The result may be empty. Selections of different types never overlap.
    pub fn intersect(&self, other: &FieldSelection) -> FieldSelection {
        match (self, other) {
            (FieldSelection::Account(a), FieldSelection::Account(b)) => {
                FieldSelection::Account(a.intersection(b).copied().collect())
            }
            (
                FieldSelection::Document {
                    fields: a,
                    document_copy: copy_a,
                },
                FieldSelection::Document {
                    fields: b,
                    document_copy: copy_b,
                },
            ) => FieldSelection::Document {
                fields: a.intersection(b).copied().collect(),
                document_copy: *copy_a && *copy_b,
            },
            _ => self.emptied(),
        }
    }

    fn emptied(&self) -> FieldSelection {
        match self {
            FieldSelection::Account(_) => FieldSelection::Account(BTreeSet::new()),
            FieldSelection::Document { .. } => FieldSelection::Document {
                fields: BTreeSet::new(),
                document_copy: false,
            },
        }
    }
}
