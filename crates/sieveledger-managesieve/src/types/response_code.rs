//! Response codes.

use crate::parser::parse_strings;

/// Subtype of a `QUOTA` response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaKind {
    /// QUOTA/MAXSCRIPTS: too many scripts.
    MaxScripts,
    /// QUOTA/MAXSIZE: script too large.
    MaxSize,
}

/// Response code at the start of a verbose message.
///
/// These give machine-readable detail about why a command completed the
/// way it did, e.g. `NO (NONEXISTENT) "No such script"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// AUTH-TOO-WEAK: mechanism disallowed by policy.
    AuthTooWeak,
    /// ENCRYPT-NEEDED: mechanism requires a TLS layer.
    EncryptNeeded,
    /// QUOTA: a server limit was hit.
    Quota(Option<QuotaKind>),
    /// REFERRAL: the account lives on another server.
    Referral(String),
    /// SASL: final server data of a SASL exchange.
    Sasl(String),
    /// TRANSITION-NEEDED: password must be migrated.
    TransitionNeeded,
    /// TRYLATER: temporary failure.
    TryLater,
    /// ACTIVE: operation not allowed on the active script.
    Active,
    /// NONEXISTENT: no script by that name.
    NonExistent,
    /// ALREADYEXISTS: a script by that name already exists.
    AlreadyExists,
    /// TAG: echo of a NOOP tag.
    Tag(String),
    /// WARNINGS: script accepted with warnings.
    Warnings,
    /// Unknown response code.
    Unknown(String),
}

impl ResponseCode {
    /// Parses the contents between the parentheses of a response code.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let tokens = parse_strings(text).unwrap_or_default();
        let Some(name) = tokens.first() else {
            return Self::Unknown(text.to_string());
        };
        let arg = tokens.get(1).cloned().unwrap_or_default();

        match name.to_uppercase().as_str() {
            "AUTH-TOO-WEAK" => Self::AuthTooWeak,
            "ENCRYPT-NEEDED" => Self::EncryptNeeded,
            "QUOTA" => Self::Quota(None),
            "QUOTA/MAXSCRIPTS" => Self::Quota(Some(QuotaKind::MaxScripts)),
            "QUOTA/MAXSIZE" => Self::Quota(Some(QuotaKind::MaxSize)),
            "REFERRAL" => Self::Referral(arg),
            "SASL" => Self::Sasl(arg),
            "TRANSITION-NEEDED" => Self::TransitionNeeded,
            "TRYLATER" => Self::TryLater,
            "ACTIVE" => Self::Active,
            "NONEXISTENT" => Self::NonExistent,
            "ALREADYEXISTS" => Self::AlreadyExists,
            "TAG" => Self::Tag(arg),
            "WARNINGS" => Self::Warnings,
            _ => Self::Unknown(text.to_string()),
        }
    }

    /// Splits a verbose message into its leading response code and the rest.
    ///
    /// Returns `None` when the message does not start with `(`.
    #[must_use]
    pub fn split(message: &str) -> Option<(Self, &str)> {
        let message = message.trim_start();
        let body = message.strip_prefix('(')?;

        let mut in_quotes = false;
        let mut escaped = false;
        for (i, c) in body.char_indices() {
            match c {
                _ if escaped => escaped = false,
                '\\' if in_quotes => escaped = true,
                '"' => in_quotes = !in_quotes,
                ')' if !in_quotes => {
                    return Some((Self::parse(&body[..i]), body[i + 1..].trim_start()));
                }
                _ => {}
            }
        }
        None
    }
}
